//! Engagement and event tracker.
//!
//! Tracking calls enqueue into a bounded queue and return immediately. A
//! background task flushes the queue when it reaches the batch size and
//! on every flush interval. A failed flush puts the batch back at the
//! front of the queue.

use crate::config::TrackerConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::Transport;
use parking_lot::{Mutex, RwLock};
use pushreg_core::{EngagementMetric, EngagementRecord, EventRecord, LastPushMeta};
use pushreg_protocol::{ClientMessage, TrackingBatch};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
enum TrackedItem {
    Engagement(EngagementRecord),
    Event(EventRecord),
}

struct Shared {
    config: TrackerConfig,
    api_key: String,
    device_id: String,
    transport: Arc<dyn Transport>,
    queue: Mutex<VecDeque<TrackedItem>>,
    wake: Notify,
    dropped: AtomicU64,
    flushed: AtomicU64,
    last_push: RwLock<Option<Arc<LastPushMeta>>>,
    session_engagement: AtomicBool,
}

/// Records engagements and events and forwards them in batches.
pub struct EventTracker {
    shared: Arc<Shared>,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for EventTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTracker")
            .field("pending", &self.pending())
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl EventTracker {
    /// Spawns the flush task on the current tokio runtime.
    pub fn spawn(
        config: TrackerConfig,
        api_key: impl Into<String>,
        device_id: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let shared = Arc::new(Shared {
            config,
            api_key: api_key.into(),
            device_id: device_id.into(),
            transport,
            queue: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            dropped: AtomicU64::new(0),
            flushed: AtomicU64::new(0),
            last_push: RwLock::new(None),
            session_engagement: AtomicBool::new(false),
        });
        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(flush_loop(Arc::clone(&shared), stop_rx));
        Self {
            shared,
            stop: Mutex::new(Some(stop)),
            task: Mutex::new(Some(task)),
        }
    }

    /// Records a processed push.
    ///
    /// The push becomes the engagement target of later tracking calls.
    /// When the app was opened from it, the session counts as an
    /// engagement and a launch is tracked.
    pub fn record_push(&self, meta: LastPushMeta, opened: bool) -> Arc<LastPushMeta> {
        let meta = Arc::new(meta);
        *self.shared.last_push.write() = Some(Arc::clone(&meta));
        if opened {
            self.shared.session_engagement.store(true, Ordering::SeqCst);
            self.enqueue(TrackedItem::Engagement(EngagementRecord::new(
                EngagementMetric::Launch,
                Some(meta.engagement_id.clone()),
            )));
        }
        meta
    }

    /// Returns the last processed push.
    pub fn last_push(&self) -> Option<Arc<LastPushMeta>> {
        self.shared.last_push.read().clone()
    }

    /// Returns the engagement ID of the last processed push.
    pub fn last_engagement_id(&self) -> Option<String> {
        self.shared
            .last_push
            .read()
            .as_ref()
            .map(|meta| meta.engagement_id.clone())
    }

    /// Returns true once the app was opened from a push in this process.
    pub fn is_current_session_an_engagement(&self) -> bool {
        self.shared.session_engagement.load(Ordering::SeqCst)
    }

    /// Tracks an engagement.
    ///
    /// Returns false without enqueueing if the metric must be attributed
    /// to a push and none was processed yet.
    pub fn track_engagement(
        &self,
        metric: EngagementMetric,
        context: BTreeMap<String, String>,
    ) -> bool {
        let engagement_id = self.last_engagement_id();
        if metric.requires_push() && engagement_id.is_none() {
            debug!(metric = metric.name(), "No push to attribute engagement to");
            return false;
        }
        let record = EngagementRecord::new(metric, engagement_id).with_context(context);
        self.enqueue(TrackedItem::Engagement(record));
        true
    }

    /// Tracks an application-defined metric.
    pub fn track_custom_metric(&self, name: &str) {
        if name.trim().is_empty() {
            warn!("Ignoring custom metric with empty name");
            return;
        }
        if !self.track_engagement(EngagementMetric::Custom(name.to_string()), BTreeMap::new()) {
            debug!(metric = name, "Custom metric dropped");
        }
    }

    /// Tracks a custom event.
    pub fn track_event(&self, event_type: &str) {
        if event_type.trim().is_empty() {
            warn!("Ignoring event with empty type");
            return;
        }
        let record = EventRecord::new(event_type, self.last_engagement_id());
        self.enqueue(TrackedItem::Event(record));
    }

    /// Returns the number of queued items.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Returns the number of items dropped on overflow.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of items delivered.
    pub fn flushed(&self) -> u64 {
        self.shared.flushed.load(Ordering::Relaxed)
    }

    /// Flushes everything queued now. Returns the number of items sent.
    pub async fn flush(&self) -> SyncResult<usize> {
        self.shared.flush_all().await
    }

    /// Stops the flush task after a final flush attempt.
    pub async fn shutdown(&self) {
        if let Some(stop) = self.stop.lock().take() {
            let _ = stop.send(());
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Tracker task ended abnormally");
            }
        }
    }

    fn enqueue(&self, item: TrackedItem) {
        let len = {
            let mut queue = self.shared.queue.lock();
            if queue.len() >= self.shared.config.capacity {
                queue.pop_front();
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(capacity = self.shared.config.capacity, "Tracking queue full; dropped oldest");
            }
            queue.push_back(item);
            queue.len()
        };
        if len >= self.shared.config.batch_size {
            self.shared.wake.notify_one();
        }
    }
}

impl Shared {
    fn take_batch(&self) -> Vec<TrackedItem> {
        let mut queue = self.queue.lock();
        let n = queue.len().min(self.config.batch_size);
        queue.drain(..n).collect()
    }

    fn requeue(&self, items: Vec<TrackedItem>) {
        let mut queue = self.queue.lock();
        for item in items.into_iter().rev() {
            queue.push_front(item);
        }
        let mut dropped = 0;
        while queue.len() > self.config.capacity {
            queue.pop_front();
            dropped += 1;
        }
        if dropped > 0 {
            self.dropped.fetch_add(dropped, Ordering::Relaxed);
            warn!(dropped, "Tracking queue full after requeue; dropped oldest");
        }
    }

    async fn flush_all(&self) -> SyncResult<usize> {
        let mut sent = 0;
        loop {
            let items = self.take_batch();
            if items.is_empty() {
                return Ok(sent);
            }
            let count = items.len();

            let mut batch = TrackingBatch::new(&self.api_key, &self.device_id);
            for item in &items {
                match item {
                    TrackedItem::Engagement(e) => batch.engagements.push(e.to_wire()),
                    TrackedItem::Event(e) => batch.events.push(e.to_wire()),
                }
            }

            match self.send(ClientMessage::Track(batch)).await {
                Ok(()) => {
                    sent += count;
                    self.flushed.fetch_add(count as u64, Ordering::Relaxed);
                    debug!(count, "Tracking batch delivered");
                }
                Err(e) => {
                    warn!(error = %e, count, "Tracking flush failed; requeued");
                    self.requeue(items);
                    return Err(e);
                }
            }
        }
    }

    async fn send(&self, message: ClientMessage) -> SyncResult<()> {
        let ack = time::timeout(self.config.request_timeout, self.transport.send(&message))
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
}

async fn flush_loop(shared: Arc<Shared>, mut stop: oneshot::Receiver<()>) {
    let mut interval = time::interval(shared.config.flush_interval);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = shared.wake.notified() => {}
            _ = interval.tick() => {}
        }
        // Failures are logged and requeued inside.
        let _ = shared.flush_all().await;
    }

    if let Err(e) = shared.flush_all().await {
        debug!(error = %e, "Final tracking flush failed");
    }
}
