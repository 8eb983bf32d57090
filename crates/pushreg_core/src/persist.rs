//! Persisted client state.
//!
//! Each part of the state lives under its own blob key, CBOR-encoded:
//! `device_id`, `registration` and `preferences`.

use crate::error::{CoreError, CoreResult};
use crate::preference::PreferenceStore;
use crate::registration::RegistrationState;
use crate::types::DeviceId;
use pushreg_storage::BlobStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

const DEVICE_ID_KEY: &str = "device_id";
const REGISTRATION_KEY: &str = "registration";
const PREFERENCES_KEY: &str = "preferences";

/// Everything the client persists.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    /// Device identity.
    pub device_id: DeviceId,
    /// Registration state.
    pub registration: RegistrationState,
    /// Declared preferences.
    pub preferences: PreferenceStore,
}

/// Reads and writes [`PersistedState`] through a [`BlobStore`].
#[derive(Clone)]
pub struct StatePersistence {
    store: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for StatePersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatePersistence")
            .field("keys", &self.store.keys().unwrap_or_default())
            .finish()
    }
}

impl StatePersistence {
    /// Creates a persistence layer over `store`.
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Loads the persisted state.
    ///
    /// Returns `None` if no device ID was ever persisted. Missing
    /// registration or preference blobs load as empty.
    pub fn load(&self) -> CoreResult<Option<PersistedState>> {
        let Some(device_id) = self.load_key::<DeviceId>(DEVICE_ID_KEY)? else {
            return Ok(None);
        };
        let registration = self.load_key(REGISTRATION_KEY)?.unwrap_or_default();
        let preferences = self.load_key(PREFERENCES_KEY)?.unwrap_or_default();
        Ok(Some(PersistedState {
            device_id,
            registration,
            preferences,
        }))
    }

    /// Saves the device ID.
    pub fn save_device_id(&self, device_id: &DeviceId) -> CoreResult<()> {
        self.save_key(DEVICE_ID_KEY, device_id)
    }

    /// Saves the registration state.
    pub fn save_registration(&self, state: &RegistrationState) -> CoreResult<()> {
        self.save_key(REGISTRATION_KEY, state)
    }

    /// Saves the preference store.
    pub fn save_preferences(&self, store: &PreferenceStore) -> CoreResult<()> {
        self.save_key(PREFERENCES_KEY, store)
    }

    /// Saves every part of the state.
    pub fn save(&self, state: &PersistedState) -> CoreResult<()> {
        self.save_device_id(&state.device_id)?;
        self.save_registration(&state.registration)?;
        self.save_preferences(&state.preferences)
    }

    /// Removes every persisted part, including the device ID.
    pub fn clear(&self) -> CoreResult<()> {
        for key in [DEVICE_ID_KEY, REGISTRATION_KEY, PREFERENCES_KEY] {
            self.store.remove(key)?;
        }
        Ok(())
    }

    fn load_key<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>> {
        let Some(bytes) = self.store.load(key)? else {
            return Ok(None);
        };
        ciborium::from_reader(bytes.as_slice())
            .map(Some)
            .map_err(|e| CoreError::Corrupted {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    fn save_key<T: Serialize>(&self, key: &str, value: &T) -> CoreResult<()> {
        let mut bytes = Vec::new();
        ciborium::into_writer(value, &mut bytes).map_err(|e| CoreError::Codec(e.to_string()))?;
        self.store.save(key, &bytes)?;
        Ok(())
    }
}
