//! Registration state machine.
//!
//! ```text
//! Unregistered -> Unsynced -> Pending -> Synced
//!                                     -> Failed -> Pending (retry)
//! ```
//!
//! Any effective local mutation from `Synced`, `Failed` or `Unregistered`
//! returns to `Unsynced`. A mutation while `Pending` leaves the in-flight
//! request alone and flags a follow-up instead. Mutations that change
//! nothing are no-ops.

use crate::error::{CoreError, CoreResult};
use crate::fingerprint::Fingerprint;
use crate::types::ErrorInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Sync status of the registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Nothing registered, or the device was explicitly unregistered.
    Unregistered,
    /// Local state differs from what the server confirmed.
    Unsynced,
    /// A registration request is in flight.
    Pending,
    /// The server confirmed the current state.
    Synced,
    /// The last attempt failed; a retry may be scheduled.
    Failed,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unregistered => "unregistered",
            Self::Unsynced => "unsynced",
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of reconciling a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// Status after reconciliation.
    pub status: SyncStatus,
    /// Whether another cycle must run right away.
    pub follow_up: bool,
}

/// Device token, user ID and categories plus their sync status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationState {
    device_token: Option<Vec<u8>>,
    user_id: Option<String>,
    categories: BTreeSet<String>,
    last_synced_hash: Option<Fingerprint>,
    status: SyncStatus,
    last_error: Option<ErrorInfo>,
    epoch: u64,
    dirty_during_pending: bool,
    pending_deregistration: bool,
}

impl Default for RegistrationState {
    fn default() -> Self {
        Self {
            device_token: None,
            user_id: None,
            categories: BTreeSet::new(),
            last_synced_hash: None,
            status: SyncStatus::Unregistered,
            last_error: None,
            epoch: 0,
            dirty_during_pending: false,
            pending_deregistration: false,
        }
    }
}

impl RegistrationState {
    /// Creates an empty, unregistered state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an empty state in a later epoch, so completions of cycles
    /// started before the reset are stale.
    pub fn cleared(&self) -> Self {
        Self {
            epoch: self.epoch + 1,
            ..Self::default()
        }
    }

    /// Returns the sync status.
    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// Returns the device token.
    pub fn device_token(&self) -> Option<&[u8]> {
        self.device_token.as_deref()
    }

    /// Returns the registered user ID.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Returns the registered categories, sorted.
    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    /// Returns the fingerprint the server last confirmed.
    pub fn last_synced_hash(&self) -> Option<Fingerprint> {
        self.last_synced_hash
    }

    /// Returns the error from the last failed attempt.
    pub fn last_error(&self) -> Option<&ErrorInfo> {
        self.last_error.as_ref()
    }

    /// Returns the unregistration epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns true if a mutation arrived while a request was in flight.
    pub fn is_dirty_during_pending(&self) -> bool {
        self.dirty_during_pending
    }

    /// Returns true if a device deletion still has to be sent.
    pub fn has_pending_deregistration(&self) -> bool {
        self.pending_deregistration
    }

    /// Computes the fingerprint of the current tuple.
    pub fn fingerprint(&self) -> CoreResult<Fingerprint> {
        Fingerprint::compute(
            self.device_token.as_deref(),
            self.user_id.as_deref(),
            &self.categories,
        )
    }

    /// Returns true unless the state claims `Synced` for a tuple the server
    /// never confirmed.
    pub fn is_consistent(&self) -> CoreResult<bool> {
        if self.status != SyncStatus::Synced {
            return Ok(true);
        }
        Ok(self.last_synced_hash == Some(self.fingerprint()?))
    }

    /// Sets the push token. Returns true if it changed.
    pub fn set_device_token(&mut self, token: Vec<u8>) -> CoreResult<bool> {
        if token.is_empty() {
            return Err(CoreError::validation("device token must not be empty"));
        }
        if self.device_token.as_deref() == Some(token.as_slice()) {
            return Ok(false);
        }
        self.device_token = Some(token);
        self.touch();
        Ok(true)
    }

    /// Sets the user ID. Returns true if it changed.
    pub fn set_user_id(&mut self, user_id: &str) -> CoreResult<bool> {
        if user_id.trim().is_empty() {
            return Err(CoreError::validation("user ID must not be empty"));
        }
        if self.user_id.as_deref() == Some(user_id) {
            return Ok(false);
        }
        self.user_id = Some(user_id.to_string());
        self.touch();
        Ok(true)
    }

    /// Clears the user ID. Returns true if one was set.
    pub fn unregister_user_id(&mut self) -> bool {
        if self.user_id.take().is_none() {
            return false;
        }
        self.touch();
        true
    }

    /// Returns true if `user_id` is the registered user ID.
    pub fn is_registered_for_user_id(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }

    /// Adds categories. Returns true if the set changed.
    pub fn add_categories<I, S>(&mut self, categories: I) -> CoreResult<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let incoming = collect_categories(categories)?;
        let before = self.categories.len();
        self.categories.extend(incoming);
        let changed = self.categories.len() != before;
        if changed {
            self.touch();
        }
        Ok(changed)
    }

    /// Removes categories. Returns true if the set changed.
    pub fn remove_categories<I, S>(&mut self, categories: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut changed = false;
        for category in categories {
            changed |= self.categories.remove(category.as_ref());
        }
        if changed {
            self.touch();
        }
        changed
    }

    /// Replaces the whole category set.
    ///
    /// An empty list is exactly [`unregister_all`](Self::unregister_all).
    pub fn replace_categories<I, S>(&mut self, categories: I) -> CoreResult<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let incoming = collect_categories(categories)?;
        if incoming.is_empty() {
            return Ok(self.unregister_all());
        }
        if incoming == self.categories {
            return Ok(false);
        }
        self.categories = incoming;
        self.touch();
        Ok(true)
    }

    /// Removes every category. Returns true if any was registered.
    pub fn unregister_all(&mut self) -> bool {
        if self.categories.is_empty() {
            return false;
        }
        self.categories.clear();
        self.touch();
        true
    }

    /// Returns true if `category` is registered.
    pub fn is_registered_for_category(&self, category: &str) -> bool {
        self.categories.contains(category)
    }

    /// Unregisters the device.
    ///
    /// Clears token, user ID and categories, bumps the epoch so any
    /// in-flight completion becomes stale, and queues a device deletion.
    pub fn unregister(&mut self) {
        self.device_token = None;
        self.user_id = None;
        self.categories.clear();
        self.last_synced_hash = None;
        self.last_error = None;
        self.status = SyncStatus::Unregistered;
        self.dirty_during_pending = false;
        self.pending_deregistration = true;
        self.epoch += 1;
    }

    /// Records that the OS failed to issue a push token.
    pub fn record_token_failure(&mut self, error: ErrorInfo) {
        if self.status != SyncStatus::Pending {
            self.status = SyncStatus::Failed;
        }
        self.last_error = Some(error);
    }

    /// Restores a state loaded from storage.
    ///
    /// A request cannot survive a restart, so `Pending` becomes `Unsynced`.
    pub fn restore_after_load(&mut self) {
        if self.status == SyncStatus::Pending {
            self.status = SyncStatus::Unsynced;
        }
        if self.dirty_during_pending {
            self.dirty_during_pending = false;
            if self.status == SyncStatus::Synced {
                self.status = SyncStatus::Unsynced;
            }
        }
    }

    /// Marks a registration request as in flight.
    pub fn mark_pending(&mut self) {
        self.status = SyncStatus::Pending;
        self.dirty_during_pending = false;
    }

    /// Marks the state as already confirmed by the server.
    pub fn mark_up_to_date(&mut self) {
        self.status = SyncStatus::Synced;
        self.last_error = None;
    }

    /// Reconciles a successful registration of `sent`.
    pub fn complete_registration(
        &mut self,
        epoch: u64,
        sent: Fingerprint,
    ) -> CoreResult<CompletionOutcome> {
        self.check_epoch(epoch)?;
        self.last_synced_hash = Some(sent);
        self.last_error = None;

        if self.dirty_during_pending {
            self.dirty_during_pending = false;
            self.status = SyncStatus::Unsynced;
            return Ok(CompletionOutcome {
                status: self.status,
                follow_up: true,
            });
        }
        self.status = SyncStatus::Synced;
        Ok(CompletionOutcome {
            status: self.status,
            follow_up: false,
        })
    }

    /// Reconciles a failed registration.
    pub fn fail_registration(&mut self, epoch: u64, error: ErrorInfo) -> CoreResult<()> {
        self.check_epoch(epoch)?;
        self.status = SyncStatus::Failed;
        self.last_error = Some(error);
        // The retry sends the latest state, so the follow-up is folded in.
        self.dirty_during_pending = false;
        Ok(())
    }

    /// Reconciles a successful device deletion.
    pub fn complete_deregistration(&mut self, epoch: u64) -> CoreResult<()> {
        self.check_epoch(epoch)?;
        self.pending_deregistration = false;
        Ok(())
    }

    /// Records a failed device deletion; the deletion stays queued.
    pub fn fail_deregistration(&mut self, epoch: u64, error: ErrorInfo) -> CoreResult<()> {
        self.check_epoch(epoch)?;
        self.last_error = Some(error);
        Ok(())
    }

    fn check_epoch(&self, epoch: u64) -> CoreResult<()> {
        if epoch != self.epoch {
            return Err(CoreError::StateConflict {
                cycle_epoch: epoch,
                current_epoch: self.epoch,
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        match self.status {
            SyncStatus::Pending => self.dirty_during_pending = true,
            _ => self.status = SyncStatus::Unsynced,
        }
    }
}

fn collect_categories<I, S>(categories: I) -> CoreResult<BTreeSet<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut set = BTreeSet::new();
    for category in categories {
        let category = category.as_ref();
        if category.trim().is_empty() {
            return Err(CoreError::validation("category must not be empty"));
        }
        set.insert(category.to_string());
    }
    Ok(set)
}
