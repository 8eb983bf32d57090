//! Request handlers for registration endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::registry::DeviceRegistry;
use parking_lot::Mutex;
use pushreg_protocol::{
    ClientMessage, DeregistrationRequest, RegistrationRequest, ServerAck, TrackingBatch,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Device registry (shared across all handlers).
    pub registry: Arc<DeviceRegistry>,
    failures: Mutex<VecDeque<u16>>,
    requests: AtomicU64,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, registry: Arc<DeviceRegistry>) -> Self {
        let failures = config.injected_failures.iter().copied().collect();
        Self {
            config,
            registry,
            failures: Mutex::new(failures),
            requests: AtomicU64::new(0),
        }
    }

    /// Answers the next `count` requests with `status`.
    pub fn inject_failures(&self, status: u16, count: usize) {
        self.failures
            .lock()
            .extend(std::iter::repeat(status).take(count));
    }

    /// Returns the number of requests received.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    fn next_failure(&self) -> Option<u16> {
        self.failures.lock().pop_front()
    }
}

/// Handler for registration requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles any client message.
    pub fn handle(&self, message: ClientMessage) -> ServerResult<ServerAck> {
        self.context.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.context.next_failure() {
            debug!(status, "Injecting failure");
            return Err(ServerError::Injected { status });
        }

        match message {
            ClientMessage::Register(request) => self.handle_register(request),
            ClientMessage::Deregister(request) => self.handle_deregister(request),
            ClientMessage::Track(batch) => self.handle_track(batch),
        }
    }

    /// Handles a registration.
    pub fn handle_register(&self, request: RegistrationRequest) -> ServerResult<ServerAck> {
        self.authorize(&request.api_key)?;
        require_device(&request.device_id)?;

        if let Some(token) = &request.device_token {
            if token.is_empty() || !token.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ServerError::InvalidRequest(
                    "device token must be hex".into(),
                ));
            }
        }
        if request.categories.len() > self.context.config.max_categories {
            return Err(ServerError::InvalidRequest(format!(
                "Too many categories: {} > {}",
                request.categories.len(),
                self.context.config.max_categories
            )));
        }

        let device_id = request.device_id.clone();
        let fingerprint = self.context.registry.upsert(request);
        debug!(%device_id, %fingerprint, "Device registered");
        Ok(ServerAck::registered(fingerprint))
    }

    /// Handles a deregistration. Unknown devices are not an error.
    pub fn handle_deregister(&self, request: DeregistrationRequest) -> ServerResult<ServerAck> {
        self.authorize(&request.api_key)?;
        require_device(&request.device_id)?;

        let existed = self.context.registry.remove(&request.device_id);
        debug!(device_id = %request.device_id, existed, "Device deregistered");
        Ok(ServerAck::ok())
    }

    /// Handles a tracking batch.
    pub fn handle_track(&self, batch: TrackingBatch) -> ServerResult<ServerAck> {
        self.authorize(&batch.api_key)?;
        require_device(&batch.device_id)?;

        if batch.len() > self.context.config.max_batch_items {
            return Err(ServerError::InvalidRequest(format!(
                "Too many items: {} > {}",
                batch.len(),
                self.context.config.max_batch_items
            )));
        }
        self.context.registry.record_tracking(batch);
        Ok(ServerAck::ok())
    }

    fn authorize(&self, api_key: &str) -> ServerResult<()> {
        if self.context.config.accepts(api_key) {
            Ok(())
        } else {
            Err(ServerError::Unauthorized)
        }
    }
}

fn require_device(device_id: &str) -> ServerResult<()> {
    if device_id.is_empty() {
        return Err(ServerError::InvalidRequest("missing device id".into()));
    }
    Ok(())
}
