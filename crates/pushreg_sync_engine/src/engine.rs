//! Registration sync engine.
//!
//! A single worker task owns the sync cycle. Explicit triggers, debounce
//! expiry and retry timers all funnel through it, so at most one
//! registration request is ever in flight. Callers return immediately and
//! learn outcomes through observers, or await [`SyncEngine::sync_now`].

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::observer::{ObserverRegistry, RegistrationEvent};
use crate::transport::Transport;
use parking_lot::{Mutex, RwLock};
use pushreg_core::{
    ClientState, CycleKind, CyclePlan, CycleTicket, ErrorInfo, RequestContext, SkipReason,
    SyncStatus,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant as Deadline};
use tracing::{debug, info, warn};

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles that ended with a server acknowledgement.
    pub cycles_completed: u64,
    /// Transport calls made.
    pub requests_sent: u64,
    /// Failed transport calls.
    pub failures: u64,
    /// Retries scheduled after failures.
    pub retries_scheduled: u64,
    /// Cycles that had nothing to send.
    pub cycles_skipped: u64,
    /// Completions discarded because an unregister or reset superseded them.
    pub superseded: u64,
    /// Last successful sync time.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Outcome of an explicit sync run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// Transport calls made during the run.
    pub requests_sent: u32,
    /// Registration status when the run ended.
    pub status: SyncStatus,
    /// Why the last cycle had nothing to send, if it didn't.
    pub skipped: Option<SkipReason>,
    /// Error of the last failed attempt in this run.
    pub error: Option<ErrorInfo>,
    /// Whether a retry is scheduled.
    pub retry_scheduled: bool,
}

#[derive(Debug)]
enum EngineCommand {
    MarkDirty,
    Sync {
        reply: Option<oneshot::Sender<SyncReport>>,
    },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Explicit,
    Debounce,
    Retry,
}

enum CycleOutcome {
    Skipped(SkipReason),
    Succeeded { follow_up: bool },
    Failed(ErrorInfo),
    Superseded,
    Aborted(ErrorInfo),
}

/// Handle to the sync worker.
pub struct SyncEngine {
    commands: mpsc::UnboundedSender<EngineCommand>,
    stats: Arc<RwLock<SyncStats>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("running", &!self.commands.is_closed())
            .finish()
    }
}

impl SyncEngine {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn(
        config: SyncConfig,
        context: RequestContext,
        state: Arc<ClientState>,
        transport: Arc<dyn Transport>,
        observers: Arc<ObserverRegistry>,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(RwLock::new(SyncStats::default()));
        let worker = Worker {
            config,
            context,
            state,
            transport,
            observers,
            stats: Arc::clone(&stats),
            debounce_deadline: None,
            debounce_started: None,
            retry_deadline: None,
            failures: 0,
        };
        let task = tokio::spawn(worker.run(rx));
        Self {
            commands,
            stats,
            task: Mutex::new(Some(task)),
        }
    }

    /// Notes a local mutation; a cycle runs after the debounce window.
    pub fn mark_dirty(&self) {
        self.send(EngineCommand::MarkDirty);
    }

    /// Starts a cycle right away without waiting for it.
    pub fn trigger(&self) {
        self.send(EngineCommand::Sync { reply: None });
    }

    /// Runs a cycle right away, including any follow-up, and reports the
    /// outcome.
    pub async fn sync_now(&self) -> SyncResult<SyncReport> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(EngineCommand::Sync { reply: Some(reply) })
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)
    }

    /// Returns sync statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Stops the worker after the current cycle.
    pub async fn shutdown(&self) {
        self.send(EngineCommand::Shutdown);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Sync worker ended abnormally");
            }
        }
    }

    fn send(&self, command: EngineCommand) {
        if self.commands.send(command).is_err() {
            debug!("Sync worker stopped; command dropped");
        }
    }
}

struct Worker {
    config: SyncConfig,
    context: RequestContext,
    state: Arc<ClientState>,
    transport: Arc<dyn Transport>,
    observers: Arc<ObserverRegistry>,
    stats: Arc<RwLock<SyncStats>>,
    debounce_deadline: Option<Deadline>,
    debounce_started: Option<Deadline>,
    retry_deadline: Option<Deadline>,
    failures: u32,
}

async fn sleep_until_opt(deadline: Option<Deadline>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<EngineCommand>) {
        debug!("Sync worker started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    None | Some(EngineCommand::Shutdown) => break,
                    Some(EngineCommand::MarkDirty) => self.schedule_debounce(),
                    Some(EngineCommand::Sync { reply }) => {
                        let report = self.drive(Trigger::Explicit).await;
                        if let Some(reply) = reply {
                            // The caller may have stopped waiting.
                            let _ = reply.send(report);
                        }
                    }
                },
                _ = sleep_until_opt(self.debounce_deadline) => {
                    self.debounce_deadline = None;
                    self.debounce_started = None;
                    if self.retry_deadline.is_some() {
                        debug!("Debounce folded into scheduled retry");
                        continue;
                    }
                    self.drive(Trigger::Debounce).await;
                }
                _ = sleep_until_opt(self.retry_deadline) => {
                    self.retry_deadline = None;
                    self.drive(Trigger::Retry).await;
                }
            }
        }
        debug!("Sync worker stopped");
    }

    fn schedule_debounce(&mut self) {
        let now = Deadline::now();
        let started = *self.debounce_started.get_or_insert(now);
        let deadline = (now + self.config.debounce).min(started + self.config.max_debounce_wait);
        self.debounce_deadline = Some(deadline);
    }

    /// Runs cycles until nothing is left to send or an attempt fails.
    async fn drive(&mut self, trigger: Trigger) -> SyncReport {
        if trigger != Trigger::Retry {
            self.failures = 0;
            self.retry_deadline = None;
        }
        if trigger == Trigger::Explicit {
            self.debounce_deadline = None;
            self.debounce_started = None;
        }

        let mut report = SyncReport {
            requests_sent: 0,
            status: self.state.status(),
            skipped: None,
            error: None,
            retry_scheduled: false,
        };

        loop {
            let sent_before = self.stats.read().requests_sent;
            let outcome = self.run_cycle().await;
            report.requests_sent += (self.stats.read().requests_sent - sent_before) as u32;

            match outcome {
                CycleOutcome::Skipped(reason) => {
                    report.skipped = Some(reason);
                    break;
                }
                CycleOutcome::Succeeded { follow_up } => {
                    self.failures = 0;
                    if !follow_up {
                        break;
                    }
                    debug!("State changed in flight; running follow-up cycle");
                }
                CycleOutcome::Superseded => {}
                CycleOutcome::Failed(error) => {
                    report.retry_scheduled = self.schedule_retry(&error);
                    report.error = Some(error);
                    break;
                }
                CycleOutcome::Aborted(error) => {
                    report.error = Some(error);
                    break;
                }
            }
        }

        report.status = self.state.status();
        report
    }

    async fn run_cycle(&mut self) -> CycleOutcome {
        let plan = match self.state.begin_cycle(&self.context) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "Could not start sync cycle");
                return CycleOutcome::Aborted(ErrorInfo::new(e.to_string(), None, false));
            }
        };
        let ticket = match plan {
            CyclePlan::Send(ticket) => ticket,
            CyclePlan::Skip(reason) => {
                debug!(?reason, "Sync cycle skipped");
                self.stats.write().cycles_skipped += 1;
                return CycleOutcome::Skipped(reason);
            }
        };

        debug!(kind = ?ticket.kind, epoch = ticket.epoch, "Sync cycle started");
        self.stats.write().requests_sent += 1;
        match self.exchange(&ticket).await {
            Ok(()) => self.on_success(&ticket),
            Err(e) => self.on_failure(&ticket, e),
        }
    }

    async fn exchange(&self, ticket: &CycleTicket) -> SyncResult<()> {
        let ack = time::timeout(
            self.config.request_timeout,
            self.transport.send(&ticket.message),
        )
        .await
        .map_err(|_| SyncError::Timeout)??;

        if !ack.is_success() {
            let message = ack
                .message
                .unwrap_or_else(|| format!("status {}", ack.status_code));
            return Err(SyncError::from_status(ack.status_code, message));
        }
        Ok(())
    }

    fn on_success(&mut self, ticket: &CycleTicket) -> CycleOutcome {
        match self.state.complete_success(ticket) {
            Ok(outcome) => {
                {
                    let mut stats = self.stats.write();
                    stats.cycles_completed += 1;
                    stats.last_sync_time = Some(Instant::now());
                }
                match ticket.kind {
                    CycleKind::Registration { fingerprint, .. } => {
                        info!(%fingerprint, status = %outcome.status, "Registration confirmed");
                        self.observers.emit(RegistrationEvent::RegistrationSucceeded);
                    }
                    CycleKind::Deregistration => info!("Device deregistered"),
                }
                CycleOutcome::Succeeded {
                    follow_up: outcome.follow_up,
                }
            }
            Err(e) if e.is_state_conflict() => {
                debug!(error = %e, "Completion superseded");
                self.stats.write().superseded += 1;
                CycleOutcome::Superseded
            }
            Err(e) => {
                warn!(error = %e, "Could not reconcile acknowledgement");
                CycleOutcome::Aborted(ErrorInfo::new(e.to_string(), None, false))
            }
        }
    }

    fn on_failure(&mut self, ticket: &CycleTicket, error: SyncError) -> CycleOutcome {
        let info = error.to_error_info();
        {
            let mut stats = self.stats.write();
            stats.failures += 1;
            stats.last_error = Some(info.message.clone());
        }

        match self.state.complete_failure(ticket, info.clone()) {
            Ok(()) => {}
            Err(e) if e.is_state_conflict() => {
                debug!(error = %e, "Failure superseded");
                self.stats.write().superseded += 1;
                return CycleOutcome::Superseded;
            }
            Err(e) => {
                warn!(error = %e, "Could not record failure");
                return CycleOutcome::Aborted(info);
            }
        }

        match ticket.kind {
            CycleKind::Registration { .. } => {
                warn!(error = %info, "Registration failed");
                self.observers.emit(RegistrationEvent::RegistrationFailed {
                    status_code: info.status_code.unwrap_or(0),
                    error: info.clone(),
                });
            }
            CycleKind::Deregistration => warn!(error = %info, "Deregistration failed"),
        }
        CycleOutcome::Failed(info)
    }

    fn schedule_retry(&mut self, error: &ErrorInfo) -> bool {
        self.failures += 1;
        if !error.retryable {
            info!(error = %error, "Not retrying");
            return false;
        }
        if !self.config.retry.allows_retry(self.failures) {
            warn!(attempts = self.failures, "Giving up until the next change");
            return false;
        }

        let delay = self.config.retry.delay_for_attempt(self.failures);
        self.retry_deadline = Some(Deadline::now() + delay);
        self.stats.write().retries_scheduled += 1;
        info!(attempt = self.failures, ?delay, "Retry scheduled");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::transport::MockTransport;
    use pushreg_protocol::ClientMessage;
    use std::time::Duration;

    struct Harness {
        state: Arc<ClientState>,
        transport: Arc<MockTransport>,
        observers: Arc<ObserverRegistry>,
        engine: SyncEngine,
    }

    fn harness(config: SyncConfig) -> Harness {
        let state = Arc::new(ClientState::in_memory());
        let transport = Arc::new(MockTransport::new());
        let observers = Arc::new(ObserverRegistry::new());
        let context = RequestContext {
            api_key: "key".into(),
            time_zone: None,
            sdk_version: "test".into(),
        };
        let engine = SyncEngine::spawn(
            config,
            context,
            Arc::clone(&state),
            transport.clone(),
            Arc::clone(&observers),
        );
        Harness {
            state,
            transport,
            observers,
            engine,
        }
    }

    fn config() -> SyncConfig {
        SyncConfig::default().with_retry(RetryConfig::default().with_jitter(false))
    }

    fn set_token(state: &ClientState) {
        state
            .mutate_registration(|r| r.set_device_token(vec![0xab, 0xcd]))
            .unwrap();
    }

    async fn settle() {
        time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_to_send_when_unregistered() {
        let h = harness(config());
        let report = h.engine.sync_now().await.unwrap();
        assert_eq!(report.skipped, Some(SkipReason::Unregistered));
        assert_eq!(report.requests_sent, 0);

        h.state
            .mutate_registration(|r| r.add_categories(["news"]))
            .unwrap();
        let report = h.engine.sync_now().await.unwrap();
        assert_eq!(report.skipped, Some(SkipReason::NoToken));
        assert_eq!(h.transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_sync_registers() {
        let h = harness(config());
        set_token(&h.state);

        let report = h.engine.sync_now().await.unwrap();
        assert_eq!(report.requests_sent, 1);
        assert_eq!(report.status, SyncStatus::Synced);
        assert!(report.error.is_none());

        // Same state again is a no-op.
        let report = h.engine.sync_now().await.unwrap();
        assert_eq!(report.requests_sent, 0);
        assert_eq!(report.skipped, Some(SkipReason::UpToDate));

        let stats = h.engine.stats();
        assert_eq!(stats.cycles_completed, 1);
        assert_eq!(stats.cycles_skipped, 1);
        assert!(stats.last_sync_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn mutations_are_debounced() {
        let h = harness(config());
        set_token(&h.state);
        h.engine.mark_dirty();

        time::sleep(Duration::from_millis(500)).await;
        h.state
            .mutate_registration(|r| r.add_categories(["a"]))
            .unwrap();
        h.engine.mark_dirty();

        time::sleep(Duration::from_millis(900)).await;
        assert_eq!(h.transport.call_count(), 0);

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.transport.call_count(), 1);
        assert_eq!(h.transport.registrations()[0].categories, vec!["a"]);
        assert_eq!(h.state.status(), SyncStatus::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_is_capped() {
        let h = harness(config());
        set_token(&h.state);

        for _ in 0..12 {
            h.engine.mark_dirty();
            time::sleep(Duration::from_millis(900)).await;
        }
        assert_eq!(h.transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn mutation_while_pending_runs_one_follow_up() {
        let h = harness(config());
        set_token(&h.state);
        h.transport.hold();

        h.engine.trigger();
        settle().await;
        assert_eq!(h.transport.call_count(), 1);
        assert_eq!(h.state.status(), SyncStatus::Pending);

        h.state
            .mutate_registration(|r| r.add_categories(["late"]))
            .unwrap();
        h.engine.trigger();
        h.engine.trigger();
        settle().await;
        assert_eq!(h.transport.call_count(), 1);

        h.transport.release();
        settle().await;
        assert_eq!(h.transport.call_count(), 2);
        assert_eq!(h.transport.registrations()[1].categories, vec!["late"]);
        assert_eq!(h.state.status(), SyncStatus::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_back_off_then_succeed() {
        let h = harness(config());
        let mut events = h.observers.listen();
        set_token(&h.state);
        h.transport.fail_next(3);

        let report = h.engine.sync_now().await.unwrap();
        assert_eq!(report.status, SyncStatus::Failed);
        assert!(report.retry_scheduled);
        assert_eq!(report.error.as_ref().and_then(|e| e.status_code), Some(503));

        time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(h.transport.call_count(), 2);
        assert_eq!(h.state.status(), SyncStatus::Failed);

        time::sleep(Duration::from_secs(4)).await;
        assert_eq!(h.transport.call_count(), 3);

        time::sleep(Duration::from_secs(8)).await;
        assert_eq!(h.transport.call_count(), 4);
        assert_eq!(h.state.status(), SyncStatus::Synced);

        let mut failed = 0;
        let mut succeeded = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                RegistrationEvent::RegistrationFailed { status_code, .. } => {
                    assert_eq!(status_code, 503);
                    failed += 1;
                }
                RegistrationEvent::RegistrationSucceeded => succeeded += 1,
                _ => {}
            }
        }
        assert_eq!((failed, succeeded), (3, 1));
        assert_eq!(h.engine.stats().retries_scheduled, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_retries_give_up() {
        let retry = RetryConfig::new(2).with_jitter(false);
        let h = harness(SyncConfig::default().with_retry(retry));
        set_token(&h.state);
        h.transport.fail_next(5);

        h.engine.sync_now().await.unwrap();
        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(h.transport.call_count(), 2);
        assert_eq!(h.state.status(), SyncStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let h = harness(config());
        set_token(&h.state);
        h.transport.push_status(401);

        let report = h.engine.sync_now().await.unwrap();
        assert!(!report.retry_scheduled);
        assert_eq!(report.error.as_ref().and_then(|e| e.status_code), Some(401));

        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(h.transport.call_count(), 1);
        assert_eq!(
            h.state.registration().last_error().and_then(|e| e.status_code),
            Some(401)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_requests_time_out() {
        let h = harness(config().with_request_timeout(Duration::from_secs(5)));
        set_token(&h.state);
        h.transport.hold();

        let report = h.engine.sync_now().await.unwrap();
        assert_eq!(report.status, SyncStatus::Failed);
        assert!(report.retry_scheduled);
        assert_eq!(report.error.map(|e| e.status_code), Some(None));
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_folds_into_scheduled_retry() {
        let h = harness(config());
        set_token(&h.state);
        h.transport.fail_next(1);

        h.engine.sync_now().await.unwrap();
        h.engine.mark_dirty();

        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(h.transport.call_count(), 1);

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.transport.call_count(), 2);
        assert_eq!(h.state.status(), SyncStatus::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn unregister_supersedes_in_flight_registration() {
        let h = harness(config());
        let mut events = h.observers.listen();
        set_token(&h.state);
        h.transport.hold();

        h.engine.trigger();
        settle().await;
        h.state
            .mutate_registration(|r| {
                r.unregister();
                Ok(())
            })
            .unwrap();
        h.transport.release();
        settle().await;

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(matches!(requests[1], ClientMessage::Deregister(_)));
        assert_eq!(h.state.status(), SyncStatus::Unregistered);
        assert!(!h.state.registration().has_pending_deregistration());
        assert_eq!(h.engine.stats().superseded, 1);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_deregistration_is_retried_quietly() {
        let h = harness(config());
        set_token(&h.state);
        h.engine.sync_now().await.unwrap();
        assert_eq!(h.transport.call_count(), 1);

        let mut events = h.observers.listen();
        h.state
            .mutate_registration(|r| {
                r.unregister();
                Ok(())
            })
            .unwrap();
        h.transport.fail_next(1);

        let report = h.engine.sync_now().await.unwrap();
        assert!(report.retry_scheduled);
        assert_eq!(report.status, SyncStatus::Unregistered);
        assert!(h.state.registration().has_pending_deregistration());
        assert_eq!(h.transport.call_count(), 2);

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(h.transport.call_count(), 3);
        assert!(matches!(h.transport.requests()[2], ClientMessage::Deregister(_)));
        assert!(!h.state.registration().has_pending_deregistration());
        assert_eq!(h.state.status(), SyncStatus::Unregistered);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_worker() {
        let h = harness(config());
        h.engine.shutdown().await;
        assert!(matches!(
            h.engine.sync_now().await,
            Err(SyncError::ChannelClosed)
        ));
    }
}
