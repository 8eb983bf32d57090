//! Shared client state.
//!
//! Registration state and preferences live behind one lock so a
//! fingerprint is never computed over a half-applied mutation. Every
//! successful mutation and every reconciliation is written through to the
//! persistence layer, if one is attached.

use crate::error::CoreResult;
use crate::fingerprint::Fingerprint;
use crate::persist::{PersistedState, StatePersistence};
use crate::preference::PreferenceStore;
use crate::registration::{CompletionOutcome, RegistrationState, SyncStatus};
use crate::types::{DeviceId, ErrorInfo};
use parking_lot::Mutex;
use pushreg_protocol::{
    ClientMessage, DeregistrationRequest, RegistrationRequest, PROTOCOL_VERSION,
};
use tracing::{debug, warn};

/// Request fields that come from configuration rather than state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Application API key.
    pub api_key: String,
    /// Time zone override.
    pub time_zone: Option<String>,
    /// Client library version.
    pub sdk_version: String,
}

/// What a sync cycle sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// Device deletion.
    Deregistration,
    /// Registration of the given tuple and preference revision.
    Registration {
        /// Fingerprint sent.
        fingerprint: Fingerprint,
        /// Preference revision sent.
        preference_revision: u64,
    },
}

/// A started sync cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleTicket {
    /// Epoch the cycle was started in.
    pub epoch: u64,
    /// What is being sent.
    pub kind: CycleKind,
    /// The outbound message.
    pub message: ClientMessage,
}

/// Why a cycle had nothing to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nothing to register.
    Unregistered,
    /// Waiting for the OS to issue a push token.
    NoToken,
    /// The server already holds the current state.
    UpToDate,
    /// A request is already in flight.
    InFlight,
}

/// Decision taken at the start of a sync cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CyclePlan {
    /// Send the ticket's message.
    Send(CycleTicket),
    /// Nothing to send.
    Skip(SkipReason),
}

#[derive(Debug)]
struct LocalState {
    device_id: DeviceId,
    registration: RegistrationState,
    preferences: PreferenceStore,
}

/// Lock-protected registration state and preferences.
#[derive(Debug)]
pub struct ClientState {
    inner: Mutex<LocalState>,
    persistence: Option<StatePersistence>,
}

impl ClientState {
    /// Creates a fresh state that is not persisted.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(LocalState {
                device_id: DeviceId::generate(),
                registration: RegistrationState::new(),
                preferences: PreferenceStore::new(),
            }),
            persistence: None,
        }
    }

    /// Loads state through `persistence`, creating a device ID on first use.
    pub fn open(persistence: StatePersistence) -> CoreResult<Self> {
        let local = match persistence.load()? {
            Some(mut loaded) => {
                loaded.registration.restore_after_load();
                debug!(
                    device_id = %loaded.device_id,
                    status = %loaded.registration.status(),
                    "Loaded persisted client state"
                );
                LocalState {
                    device_id: loaded.device_id,
                    registration: loaded.registration,
                    preferences: loaded.preferences,
                }
            }
            None => {
                let device_id = DeviceId::generate();
                persistence.save_device_id(&device_id)?;
                debug!(%device_id, "Generated device ID");
                LocalState {
                    device_id,
                    registration: RegistrationState::new(),
                    preferences: PreferenceStore::new(),
                }
            }
        };
        Ok(Self {
            inner: Mutex::new(local),
            persistence: Some(persistence),
        })
    }

    /// Returns the device ID.
    pub fn device_id(&self) -> DeviceId {
        self.inner.lock().device_id
    }

    /// Returns a copy of the registration state.
    pub fn registration(&self) -> RegistrationState {
        self.inner.lock().registration.clone()
    }

    /// Returns a copy of the preference store.
    pub fn preferences(&self) -> PreferenceStore {
        self.inner.lock().preferences.clone()
    }

    /// Returns the current sync status.
    pub fn status(&self) -> SyncStatus {
        self.inner.lock().registration.status()
    }

    /// Returns a consistent copy of everything.
    pub fn snapshot(&self) -> PersistedState {
        let inner = self.inner.lock();
        PersistedState {
            device_id: inner.device_id,
            registration: inner.registration.clone(),
            preferences: inner.preferences.clone(),
        }
    }

    /// Reads registration state and preferences under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&RegistrationState, &PreferenceStore) -> R) -> R {
        let inner = self.inner.lock();
        f(&inner.registration, &inner.preferences)
    }

    /// Mutates the registration state and persists it on success.
    pub fn mutate_registration<R>(
        &self,
        f: impl FnOnce(&mut RegistrationState) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let mut inner = self.inner.lock();
        let result = f(&mut inner.registration)?;
        self.persist_registration(&inner.registration);
        Ok(result)
    }

    /// Mutates the preference store and persists it on success.
    pub fn mutate_preferences<R>(
        &self,
        f: impl FnOnce(&mut PreferenceStore) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let mut inner = self.inner.lock();
        let result = f(&mut inner.preferences)?;
        self.persist_preferences(&inner.preferences);
        Ok(result)
    }

    /// Starts a sync cycle.
    ///
    /// A queued device deletion goes first. Otherwise the current tuple is
    /// fingerprinted; if the server already holds it and preferences are
    /// clean, the state is marked `Synced` and nothing is sent.
    pub fn begin_cycle(&self, ctx: &RequestContext) -> CoreResult<CyclePlan> {
        let mut inner = self.inner.lock();
        let device_id = inner.device_id.to_string();
        let registration = &mut inner.registration;

        if registration.has_pending_deregistration() {
            let message =
                ClientMessage::Deregister(DeregistrationRequest::new(&ctx.api_key, device_id));
            return Ok(CyclePlan::Send(CycleTicket {
                epoch: registration.epoch(),
                kind: CycleKind::Deregistration,
                message,
            }));
        }

        match registration.status() {
            SyncStatus::Unregistered => return Ok(CyclePlan::Skip(SkipReason::Unregistered)),
            SyncStatus::Pending => return Ok(CyclePlan::Skip(SkipReason::InFlight)),
            SyncStatus::Unsynced | SyncStatus::Synced | SyncStatus::Failed => {}
        }
        let Some(token) = registration.device_token() else {
            return Ok(CyclePlan::Skip(SkipReason::NoToken));
        };

        let token = hex::encode(token);
        let fingerprint = registration.fingerprint()?;
        let preferences_dirty = inner.preferences.is_dirty();

        if inner.registration.last_synced_hash() == Some(fingerprint) && !preferences_dirty {
            if inner.registration.status() != SyncStatus::Synced {
                inner.registration.mark_up_to_date();
                self.persist_registration(&inner.registration);
            }
            return Ok(CyclePlan::Skip(SkipReason::UpToDate));
        }

        let request = RegistrationRequest {
            protocol_version: PROTOCOL_VERSION,
            api_key: ctx.api_key.clone(),
            device_id,
            device_token: Some(token),
            user_id: inner.registration.user_id().map(String::from),
            categories: inner.registration.categories().iter().cloned().collect(),
            preferences: preferences_dirty.then(|| inner.preferences.to_wire()),
            time_zone: ctx.time_zone.clone(),
            sdk_version: ctx.sdk_version.clone(),
            fingerprint: fingerprint.to_hex(),
        };
        let ticket = CycleTicket {
            epoch: inner.registration.epoch(),
            kind: CycleKind::Registration {
                fingerprint,
                preference_revision: inner.preferences.revision(),
            },
            message: ClientMessage::Register(request),
        };

        inner.registration.mark_pending();
        self.persist_registration(&inner.registration);
        Ok(CyclePlan::Send(ticket))
    }

    /// Reconciles a server acknowledgement.
    ///
    /// Fails with [`StateConflict`](crate::CoreError::StateConflict) if the
    /// cycle was superseded by an explicit unregister; the state is left
    /// untouched in that case.
    pub fn complete_success(&self, ticket: &CycleTicket) -> CoreResult<CompletionOutcome> {
        let mut inner = self.inner.lock();
        let outcome = match ticket.kind {
            CycleKind::Deregistration => {
                inner.registration.complete_deregistration(ticket.epoch)?;
                let status = inner.registration.status();
                CompletionOutcome {
                    status,
                    follow_up: matches!(status, SyncStatus::Unsynced | SyncStatus::Failed),
                }
            }
            CycleKind::Registration {
                fingerprint,
                preference_revision,
            } => {
                let mut outcome = inner
                    .registration
                    .complete_registration(ticket.epoch, fingerprint)?;
                inner.preferences.mark_synced(preference_revision);
                outcome.follow_up |= inner.preferences.is_dirty();
                self.persist_preferences(&inner.preferences);
                outcome
            }
        };
        self.persist_registration(&inner.registration);
        Ok(outcome)
    }

    /// Reconciles a failed attempt.
    pub fn complete_failure(&self, ticket: &CycleTicket, error: ErrorInfo) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        match ticket.kind {
            CycleKind::Deregistration => inner.registration.fail_deregistration(ticket.epoch, error)?,
            CycleKind::Registration { .. } => {
                inner.registration.fail_registration(ticket.epoch, error)?
            }
        }
        self.persist_registration(&inner.registration);
        Ok(())
    }

    /// Clears registration and preferences, keeping the device ID.
    ///
    /// A cycle in flight at the time of the reset completes as a conflict.
    pub fn reset(&self) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        inner.registration = inner.registration.cleared();
        inner.preferences = PreferenceStore::new();
        if let Some(persistence) = &self.persistence {
            persistence.save_registration(&inner.registration)?;
            persistence.save_preferences(&inner.preferences)?;
        }
        Ok(())
    }

    fn persist_registration(&self, state: &RegistrationState) {
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save_registration(state) {
                warn!(error = %e, "Failed to persist registration state");
            }
        }
    }

    fn persist_preferences(&self, store: &PreferenceStore) {
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save_preferences(store) {
                warn!(error = %e, "Failed to persist preferences");
            }
        }
    }
}
