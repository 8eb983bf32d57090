//! The push manager.
//!
//! [`PushManager`] is the single entry point of the client. Local
//! mutations are applied synchronously under the state lock, persisted,
//! and handed to the sync worker; outcomes reach the application through
//! observers. Nothing here blocks on the network.

use crate::config::{redact, ManagerConfig};
use crate::error::ManagerResult;
use pushreg_core::{
    ClientState, DeviceId, EngagementMetric, ErrorInfo, LastPushMeta, Preference,
    PreferenceKind, PreferenceStore, PreferenceValue, RegistrationState, RequestContext,
    StatePersistence, SyncStatus,
};
use pushreg_storage::{BlobStore, FileBlobStore};
use pushreg_sync_engine::{
    EventTracker, ObserverRegistry, RegistrationEvent, Subscriber, SubscriberId, SyncEngine,
    SyncReport, SyncStats, Transport,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Version of this client library.
pub const FRAMEWORK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Push registration client.
///
/// # Example
///
/// ```rust,ignore
/// use pushreg::{ManagerConfig, PushManager};
///
/// let manager = PushManager::start_in_memory(ManagerConfig::new("api-key"), transport)?;
/// manager.register_categories(["sports", "news"])?;
/// manager.did_register_for_remote_notifications(&token)?;
/// ```
///
/// Must be started from within a tokio runtime.
pub struct PushManager {
    config: ManagerConfig,
    state: Arc<ClientState>,
    observers: Arc<ObserverRegistry>,
    engine: SyncEngine,
    tracker: EventTracker,
}

impl std::fmt::Debug for PushManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushManager")
            .field("api_key", &redact(&self.config.api_key))
            .field("api_host", &self.config.api_host)
            .field("device_id", &self.state.device_id())
            .field("status", &self.state.status())
            .finish()
    }
}

impl PushManager {
    /// Starts a manager whose state lives in `store`.
    ///
    /// Persisted state is loaded first; if it is not confirmed by the
    /// server a sync is scheduled.
    pub fn start(
        config: ManagerConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn BlobStore>,
    ) -> ManagerResult<Self> {
        config.validate()?;
        let state = ClientState::open(StatePersistence::new(store))?;
        Ok(Self::with_state(config, transport, Arc::new(state)))
    }

    /// Starts a manager whose state lives in the directory `path`.
    pub fn start_in_dir(
        config: ManagerConfig,
        transport: Arc<dyn Transport>,
        path: &Path,
    ) -> ManagerResult<Self> {
        let store = FileBlobStore::open(path)?;
        Self::start(config, transport, Arc::new(store))
    }

    /// Starts a manager that keeps nothing across restarts.
    pub fn start_in_memory(
        config: ManagerConfig,
        transport: Arc<dyn Transport>,
    ) -> ManagerResult<Self> {
        config.validate()?;
        Ok(Self::with_state(
            config,
            transport,
            Arc::new(ClientState::in_memory()),
        ))
    }

    fn with_state(
        config: ManagerConfig,
        transport: Arc<dyn Transport>,
        state: Arc<ClientState>,
    ) -> Self {
        let observers = Arc::new(ObserverRegistry::new());
        let context = RequestContext {
            api_key: config.api_key.clone(),
            time_zone: config.time_zone.clone(),
            sdk_version: FRAMEWORK_VERSION.to_string(),
        };
        let engine = SyncEngine::spawn(
            config.sync.clone(),
            context,
            Arc::clone(&state),
            Arc::clone(&transport),
            Arc::clone(&observers),
        );
        let tracker = EventTracker::spawn(
            config.tracker.clone(),
            config.api_key.clone(),
            state.device_id().to_string(),
            transport,
        );

        let manager = Self {
            config,
            state,
            observers,
            engine,
            tracker,
        };
        info!(
            device_id = %manager.state.device_id(),
            status = %manager.state.status(),
            level = manager.config.debug_level.directive(),
            "Push manager started"
        );
        manager.resume();
        manager
    }

    /// Schedules a sync if persisted state is not confirmed.
    fn resume(&self) {
        let needs_sync = self.state.read(|registration, preferences| {
            registration.has_pending_deregistration()
                || (registration.device_token().is_some()
                    && (registration.status() != SyncStatus::Synced || preferences.is_dirty()))
        });
        if needs_sync {
            debug!("Resuming unconfirmed registration");
            self.engine.mark_dirty();
        }
    }

    // OS push lifecycle

    /// Handles application launch, optionally from a notification.
    pub fn did_finish_launching(&self, launch_notification: Option<&Value>) {
        if let Some(payload) = launch_notification {
            if let Err(e) = self.did_receive_remote_notification(payload, true) {
                warn!(error = %e, "Ignoring launch notification");
            }
        }
        self.resume();
    }

    /// Handles a push token issued by the OS.
    pub fn did_register_for_remote_notifications(&self, token: &[u8]) -> ManagerResult<()> {
        let changed = self
            .state
            .mutate_registration(|r| r.set_device_token(token.to_vec()))?;
        debug!(changed, "Device token received");
        self.observers.emit(RegistrationEvent::ReadyForRegistration);
        self.engine.trigger();
        Ok(())
    }

    /// Handles the OS failing to issue a push token.
    pub fn did_fail_to_register_for_remote_notifications(&self, message: &str) {
        let error = ErrorInfo::new(message, None, false);
        // Recording a failure cannot fail.
        let _ = self.state.mutate_registration(|r| {
            r.record_token_failure(error.clone());
            Ok(())
        });
        warn!(error = %error, "OS could not issue a push token");
        self.observers.emit(RegistrationEvent::RegistrationFailed {
            error,
            status_code: 0,
        });
    }

    /// Handles a received remote notification.
    ///
    /// `opened` is true when the user opened the app from it.
    pub fn did_receive_remote_notification(
        &self,
        payload: &Value,
        opened: bool,
    ) -> ManagerResult<Arc<LastPushMeta>> {
        let meta = LastPushMeta::from_payload(payload)?;
        let meta = self.tracker.record_push(meta, opened);
        debug!(engagement_id = %meta.engagement_id, opened, "Push processed");

        self.observers
            .emit(RegistrationEvent::PushProcessed(Arc::clone(&meta)));
        if meta.content_available {
            self.observers
                .emit(RegistrationEvent::NewNewsstandContentAvailable);
        }
        Ok(meta)
    }

    /// Handles an action chosen on a notification.
    pub fn handle_action(&self, identifier: &str, payload: &Value) -> ManagerResult<bool> {
        self.did_receive_remote_notification(payload, true)?;
        let context = BTreeMap::from([("action".to_string(), identifier.to_string())]);
        Ok(self.tracker.track_engagement(EngagementMetric::Action, context))
    }

    // Registration

    /// Requests a registration of the current state right away.
    pub fn register(&self) {
        self.engine.trigger();
    }

    /// Deletes this device from the service.
    ///
    /// Token, user ID and categories are cleared; a registration in
    /// flight is superseded.
    pub fn unregister(&self) {
        let _ = self.state.mutate_registration(|r| {
            r.unregister();
            Ok(())
        });
        info!("Device unregistered");
        self.engine.trigger();
    }

    /// Returns true once the service confirmed the current registration.
    pub fn ready_to_receive_push_notifications(&self) -> bool {
        self.state.status() == SyncStatus::Synced
    }

    /// Replaces the registered categories. An empty list unregisters all.
    pub fn register_categories<I, S>(&self, categories: I) -> ManagerResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.mutate_registration(|r| r.replace_categories(categories))
    }

    /// Adds a category.
    pub fn register_category(&self, category: &str) -> ManagerResult<()> {
        self.mutate_registration(|r| r.add_categories([category]))
    }

    /// Removes a category.
    pub fn unregister_category(&self, category: &str) -> ManagerResult<()> {
        self.mutate_registration(|r| Ok(r.remove_categories([category])))
    }

    /// Removes several categories.
    pub fn unregister_categories<I, S>(&self, categories: I) -> ManagerResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.mutate_registration(|r| Ok(r.remove_categories(categories)))
    }

    /// Removes every category.
    pub fn unregister_all_categories(&self) -> ManagerResult<()> {
        self.mutate_registration(|r| Ok(r.unregister_all()))
    }

    /// Returns true if `category` is registered.
    pub fn is_registered_for_category(&self, category: &str) -> bool {
        self.state
            .read(|r, _| r.is_registered_for_category(category))
    }

    /// Returns the registered categories, sorted.
    pub fn all_registered_categories(&self) -> Vec<String> {
        self.state
            .read(|r, _| r.categories().iter().cloned().collect())
    }

    /// Sets the user ID.
    pub fn register_user_id(&self, user_id: &str) -> ManagerResult<()> {
        self.mutate_registration(|r| r.set_user_id(user_id))
    }

    /// Clears the user ID.
    pub fn unregister_user_id(&self) -> ManagerResult<()> {
        self.mutate_registration(|r| Ok(r.unregister_user_id()))
    }

    /// Returns true if `user_id` is registered.
    pub fn is_registered_for_user_id(&self, user_id: &str) -> bool {
        self.state.read(|r, _| r.is_registered_for_user_id(user_id))
    }

    /// Returns the registered user ID.
    pub fn registered_user_id(&self) -> Option<String> {
        self.state.read(|r, _| r.user_id().map(String::from))
    }

    /// Returns the registration status.
    pub fn status(&self) -> SyncStatus {
        self.state.status()
    }

    /// Returns the error of the last failed attempt.
    pub fn last_error(&self) -> Option<ErrorInfo> {
        self.state.read(|r, _| r.last_error().cloned())
    }

    /// Returns a copy of the registration state.
    pub fn registration(&self) -> RegistrationState {
        self.state.registration()
    }

    fn mutate_registration(
        &self,
        f: impl FnOnce(&mut RegistrationState) -> pushreg_core::CoreResult<bool>,
    ) -> ManagerResult<()> {
        if self.state.mutate_registration(f)? {
            self.engine.mark_dirty();
        }
        Ok(())
    }

    // Tracking

    /// Tracks an engagement with the last push.
    ///
    /// Returns false if the metric needs a push and none was processed.
    pub fn track_engagement_metric(&self, metric: EngagementMetric) -> bool {
        self.tracker.track_engagement(metric, BTreeMap::new())
    }

    /// Tracks an application-defined engagement metric.
    pub fn track_engagement_custom_metric(&self, name: &str) {
        self.tracker.track_custom_metric(name);
    }

    /// Tracks an engagement with extra context.
    pub fn track_engagement_options(
        &self,
        options: BTreeMap<String, String>,
        metric: EngagementMetric,
    ) -> bool {
        self.tracker.track_engagement(metric, options)
    }

    /// Returns true if the app was opened from a push in this process.
    pub fn is_current_session_an_engagement(&self) -> bool {
        self.tracker.is_current_session_an_engagement()
    }

    /// Tracks a custom event.
    pub fn track_event(&self, event_type: &str) {
        self.tracker.track_event(event_type);
    }

    /// Sends queued engagements and events now.
    pub async fn flush_events(&self) -> ManagerResult<usize> {
        Ok(self.tracker.flush().await?)
    }

    /// Returns the number of queued engagements and events.
    pub fn pending_events(&self) -> usize {
        self.tracker.pending()
    }

    // Preferences

    /// Declares a preference. Redeclaring with the same type updates the
    /// label.
    pub fn declare_preference(
        &self,
        key: &str,
        label: &str,
        kind: PreferenceKind,
    ) -> ManagerResult<()> {
        self.mutate_preferences(|p| p.declare(key, label, kind))
    }

    /// Assigns a boolean preference.
    pub fn set_bool_preference(&self, value: bool, key: &str) -> ManagerResult<()> {
        self.mutate_preferences(|p| p.set_value(key, PreferenceValue::Bool(value)))
    }

    /// Assigns a numeric preference.
    pub fn set_number_preference(&self, value: f64, key: &str) -> ManagerResult<()> {
        self.mutate_preferences(|p| p.set_value(key, PreferenceValue::Number(value)))
    }

    /// Assigns a string preference.
    pub fn set_string_preference(&self, value: &str, key: &str) -> ManagerResult<()> {
        self.mutate_preferences(|p| p.set_value(key, PreferenceValue::String(value.to_string())))
    }

    /// Returns a preference.
    pub fn get_preference(&self, key: &str) -> Option<Preference> {
        self.state.read(|_, p| p.get(key).cloned())
    }

    /// Returns every preference in declaration order.
    pub fn get_preferences(&self) -> Vec<Preference> {
        self.state.read(|_, p| p.all().to_vec())
    }

    /// Removes a preference.
    pub fn remove_preference(&self, key: &str) -> ManagerResult<Preference> {
        self.mutate_preferences(|p| p.remove(key))
    }

    /// Removes every preference.
    pub fn clear_all_preferences(&self) {
        let _ = self.mutate_preferences(|p| {
            p.clear_all();
            Ok(())
        });
    }

    fn mutate_preferences<R>(
        &self,
        f: impl FnOnce(&mut PreferenceStore) -> pushreg_core::CoreResult<R>,
    ) -> ManagerResult<R> {
        let (result, changed) = self.state.mutate_preferences(|p| {
            let before = p.revision();
            let result = f(p)?;
            Ok((result, p.revision() != before))
        })?;
        if changed {
            self.engine.mark_dirty();
        }
        Ok(result)
    }

    // Push metadata

    /// Returns the last processed push.
    pub fn last_push_meta(&self) -> Option<Arc<LastPushMeta>> {
        self.tracker.last_push()
    }

    /// Returns the engagement ID of the last processed push.
    pub fn last_engagement_id(&self) -> Option<String> {
        self.tracker.last_engagement_id()
    }

    /// Returns the alert text of the last processed push.
    pub fn last_alert_text(&self) -> Option<String> {
        self.last_push_meta().and_then(|m| m.alert_text.clone())
    }

    /// Returns the sound file name of the last processed push.
    pub fn last_sound_file_name(&self) -> Option<String> {
        self.last_push_meta().and_then(|m| m.sound_file_name.clone())
    }

    /// Returns the badge update of the last processed push.
    pub fn last_badge_update(&self) -> Option<String> {
        self.last_push_meta().and_then(|m| m.badge_update.clone())
    }

    // Identity and configuration

    /// Returns the device ID.
    pub fn device_id(&self) -> DeviceId {
        self.state.device_id()
    }

    /// Returns the library version.
    pub fn framework_version(&self) -> &'static str {
        FRAMEWORK_VERSION
    }

    /// Returns the API key.
    pub fn api_key(&self) -> &str {
        &self.config.api_key
    }

    /// Returns the API host.
    pub fn api_host(&self) -> &str {
        &self.config.api_host
    }

    /// Returns the time zone override.
    pub fn time_zone(&self) -> Option<&str> {
        self.config.time_zone.as_deref()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // Observers

    /// Registers an observer.
    pub fn subscribe(&self, subscriber: Subscriber) -> SubscriberId {
        self.observers.subscribe(subscriber)
    }

    /// Removes an observer.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Returns a receiver for every future notification.
    pub fn notifications(&self) -> broadcast::Receiver<RegistrationEvent> {
        self.observers.listen()
    }

    // Sync control

    /// Runs a sync right away and waits for its outcome.
    pub async fn sync_now(&self) -> ManagerResult<SyncReport> {
        Ok(self.engine.sync_now().await?)
    }

    /// Returns sync statistics.
    pub fn sync_stats(&self) -> SyncStats {
        self.engine.stats()
    }

    /// Clears registration and preferences locally, keeping the device ID.
    ///
    /// Nothing is sent; use [`unregister`](Self::unregister) to delete the
    /// device from the service.
    pub fn reset(&self) -> ManagerResult<()> {
        self.state.reset()?;
        Ok(())
    }

    /// Stops the sync worker and flushes the tracker.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
        self.tracker.shutdown().await;
        debug!("Push manager stopped");
    }
}
