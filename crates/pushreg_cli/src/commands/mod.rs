//! CLI command implementations.

pub mod inspect;
pub mod preferences;
pub mod reset;
pub mod verify;

use pushreg_core::{PersistedState, StatePersistence};
use pushreg_storage::FileBlobStore;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Opens the persistence layer over an existing state directory.
pub(crate) fn open(path: &Path) -> Result<StatePersistence, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No client state found at {:?}", path).into());
    }
    debug!(path = ?path, "Opening client state");
    let store = FileBlobStore::open(path)?;
    Ok(StatePersistence::new(Arc::new(store)))
}

/// Loads the persisted state, failing if none was ever written.
pub(crate) fn load(path: &Path) -> Result<PersistedState, Box<dyn std::error::Error>> {
    open(path)?
        .load()?
        .ok_or_else(|| format!("No client state found at {:?}", path).into())
}

#[cfg(test)]
pub(crate) mod testing {
    use pushreg_core::{ClientState, PreferenceKind, PreferenceValue, StatePersistence};
    use pushreg_storage::FileBlobStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Writes a registered client state with one preference.
    pub fn sample_state() -> (TempDir, ClientState) {
        let dir = TempDir::new().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();
        let state = ClientState::open(StatePersistence::new(Arc::new(store))).unwrap();
        state
            .mutate_registration(|r| {
                r.set_device_token(vec![0xab, 0xcd])?;
                r.set_user_id("alice")?;
                r.add_categories(["news", "sports"])
            })
            .unwrap();
        state
            .mutate_preferences(|p| {
                p.declare("alerts", "Alerts", PreferenceKind::Boolean)?;
                p.set_value("alerts", PreferenceValue::Bool(true))
            })
            .unwrap();
        (dir, state)
    }
}
