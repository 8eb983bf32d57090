//! Transport layer abstraction.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use pushreg_protocol::{ClientMessage, ServerAck};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::watch;

/// Sends client messages to the registration service.
///
/// Shared by the sync engine and the event tracker. Implementations may
/// return a non-2xx [`ServerAck`]; callers classify it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one message and waits for the acknowledgement.
    async fn send(&self, message: &ClientMessage) -> SyncResult<ServerAck>;
}

/// A scriptable transport for tests.
///
/// Answers from a queue of scripted results, falling back to success.
/// Every call is recorded when it starts. [`hold`](Self::hold) keeps new
/// and waiting calls open until [`release`](Self::release).
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    script: Mutex<VecDeque<SyncResult<ServerAck>>>,
    requests: Mutex<Vec<ClientMessage>>,
    calls: AtomicUsize,
    completed: AtomicUsize,
    gate: watch::Sender<bool>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            connected: AtomicBool::new(true),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            gate,
        }
    }

    /// Queues the result of a future call.
    pub fn push_result(&self, result: SyncResult<ServerAck>) {
        self.script.lock().push_back(result);
    }

    /// Queues a rejection with the given status.
    pub fn push_status(&self, status_code: u16) {
        self.push_result(Ok(ServerAck::rejected(status_code, "scripted failure")));
    }

    /// Queues `n` retryable 503 rejections.
    pub fn fail_next(&self, n: usize) {
        for _ in 0..n {
            self.push_status(503);
        }
    }

    /// Holds calls open until released.
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    /// Releases held calls.
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns the number of calls started.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the number of calls that returned.
    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns every message sent so far.
    pub fn requests(&self) -> Vec<ClientMessage> {
        self.requests.lock().clone()
    }

    /// Returns the registration messages sent so far.
    pub fn registrations(&self) -> Vec<pushreg_protocol::RegistrationRequest> {
        self.requests
            .lock()
            .iter()
            .filter_map(|m| match m {
                ClientMessage::Register(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, message: &ClientMessage) -> SyncResult<ServerAck> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(message.clone());

        let mut gate = self.gate.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = gate.wait_for(|open| *open).await;

        let result = if !self.connected.load(Ordering::SeqCst) {
            Err(SyncError::NotConnected)
        } else {
            let scripted = self.script.lock().pop_front();
            scripted.unwrap_or_else(|| {
                Ok(match message {
                    ClientMessage::Register(r) => ServerAck::registered(r.fingerprint.clone()),
                    _ => ServerAck::ok(),
                })
            })
        };
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}
