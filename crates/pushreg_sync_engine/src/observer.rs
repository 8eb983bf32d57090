//! Registration observers.
//!
//! Events are delivered to registered [`Subscriber`]s, each carrying only
//! the handlers it implements, and to every [`ObserverRegistry::listen`]
//! receiver with identical payloads.

use parking_lot::RwLock;
use pushreg_core::{ErrorInfo, LastPushMeta};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

const CHANNEL_CAPACITY: usize = 64;

/// An observer notification.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationEvent {
    /// The OS issued a push token; registration can proceed.
    ReadyForRegistration,
    /// The server accepted a registration.
    RegistrationSucceeded,
    /// A registration attempt failed.
    RegistrationFailed {
        /// What went wrong.
        error: ErrorInfo,
        /// Server status code, `0` when no response was received.
        status_code: u16,
    },
    /// A remote notification was processed.
    PushProcessed(Arc<LastPushMeta>),
    /// A push announced new background content.
    NewNewsstandContentAvailable,
}

/// Kinds of [`RegistrationEvent`], used as a subscriber capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`RegistrationEvent::ReadyForRegistration`].
    ReadyForRegistration,
    /// [`RegistrationEvent::RegistrationSucceeded`].
    RegistrationSucceeded,
    /// [`RegistrationEvent::RegistrationFailed`].
    RegistrationFailed,
    /// [`RegistrationEvent::PushProcessed`].
    PushProcessed,
    /// [`RegistrationEvent::NewNewsstandContentAvailable`].
    NewNewsstandContentAvailable,
}

impl RegistrationEvent {
    /// Returns the event kind.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ReadyForRegistration => EventKind::ReadyForRegistration,
            Self::RegistrationSucceeded => EventKind::RegistrationSucceeded,
            Self::RegistrationFailed { .. } => EventKind::RegistrationFailed,
            Self::PushProcessed(_) => EventKind::PushProcessed,
            Self::NewNewsstandContentAvailable => EventKind::NewNewsstandContentAvailable,
        }
    }
}

type Callback = Box<dyn Fn() + Send + Sync>;
type FailureCallback = Box<dyn Fn(&ErrorInfo, u16) + Send + Sync>;
type PushCallback = Box<dyn Fn(&LastPushMeta) + Send + Sync>;

/// A set of optional event handlers.
///
/// ```rust,ignore
/// let subscriber = Subscriber::new()
///     .on_registration_succeeded(|| println!("registered"))
///     .on_registration_failed(|err, status| eprintln!("{err} ({status})"));
/// ```
#[derive(Default)]
pub struct Subscriber {
    ready: Option<Callback>,
    succeeded: Option<Callback>,
    failed: Option<FailureCallback>,
    push: Option<PushCallback>,
    newsstand: Option<Callback>,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("ready", &self.ready.is_some())
            .field("succeeded", &self.succeeded.is_some())
            .field("failed", &self.failed.is_some())
            .field("push", &self.push.is_some())
            .field("newsstand", &self.newsstand.is_some())
            .finish()
    }
}

impl Subscriber {
    /// Creates a subscriber with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles [`RegistrationEvent::ReadyForRegistration`].
    pub fn on_ready_for_registration(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.ready = Some(Box::new(f));
        self
    }

    /// Handles [`RegistrationEvent::RegistrationSucceeded`].
    pub fn on_registration_succeeded(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.succeeded = Some(Box::new(f));
        self
    }

    /// Handles [`RegistrationEvent::RegistrationFailed`].
    pub fn on_registration_failed(
        mut self,
        f: impl Fn(&ErrorInfo, u16) + Send + Sync + 'static,
    ) -> Self {
        self.failed = Some(Box::new(f));
        self
    }

    /// Handles [`RegistrationEvent::PushProcessed`].
    pub fn on_push_processed(mut self, f: impl Fn(&LastPushMeta) + Send + Sync + 'static) -> Self {
        self.push = Some(Box::new(f));
        self
    }

    /// Handles [`RegistrationEvent::NewNewsstandContentAvailable`].
    pub fn on_newsstand_content(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.newsstand = Some(Box::new(f));
        self
    }

    /// Returns true if this subscriber handles `kind`.
    pub fn handles(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::ReadyForRegistration => self.ready.is_some(),
            EventKind::RegistrationSucceeded => self.succeeded.is_some(),
            EventKind::RegistrationFailed => self.failed.is_some(),
            EventKind::PushProcessed => self.push.is_some(),
            EventKind::NewNewsstandContentAvailable => self.newsstand.is_some(),
        }
    }

    fn deliver(&self, event: &RegistrationEvent) {
        match event {
            RegistrationEvent::ReadyForRegistration => call(&self.ready),
            RegistrationEvent::RegistrationSucceeded => call(&self.succeeded),
            RegistrationEvent::RegistrationFailed { error, status_code } => {
                if let Some(f) = &self.failed {
                    f(error, *status_code);
                }
            }
            RegistrationEvent::PushProcessed(meta) => {
                if let Some(f) = &self.push {
                    f(meta);
                }
            }
            RegistrationEvent::NewNewsstandContentAvailable => call(&self.newsstand),
        }
    }
}

fn call(callback: &Option<Callback>) {
    if let Some(f) = callback {
        f();
    }
}

/// Handle returned by [`ObserverRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Fan-out of registration events.
pub struct ObserverRegistry {
    subscribers: RwLock<Vec<(SubscriberId, Arc<Subscriber>)>>,
    next_id: AtomicU64,
    channel: broadcast::Sender<RegistrationEvent>,
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("subscribers", &self.subscriber_count())
            .field("listeners", &self.channel.receiver_count())
            .finish()
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        let (channel, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            channel,
        }
    }

    /// Registers a subscriber.
    pub fn subscribe(&self, subscriber: Subscriber) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, Arc::new(subscriber)));
        id
    }

    /// Removes a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Returns a receiver for all future events.
    pub fn listen(&self) -> broadcast::Receiver<RegistrationEvent> {
        self.channel.subscribe()
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Delivers an event to every subscriber that handles it, then to
    /// every listener.
    pub fn emit(&self, event: RegistrationEvent) {
        let kind = event.kind();
        // Handlers run outside the lock so they may (un)subscribe.
        let targets: Vec<Arc<Subscriber>> = self
            .subscribers
            .read()
            .iter()
            .filter(|(_, s)| s.handles(kind))
            .map(|(_, s)| Arc::clone(s))
            .collect();
        trace!(?kind, subscribers = targets.len(), "Emitting event");

        for subscriber in targets {
            subscriber.deliver(&event);
        }
        // No listeners is fine.
        let _ = self.channel.send(event);
    }
}
