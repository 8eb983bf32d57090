//! Reset command implementation.

use pushreg_core::ClientState;
use std::path::Path;
use tracing::warn;

/// Runs the reset command.
///
/// Registration and preferences are cleared. With `all`, the device ID is
/// forgotten too, so the next start registers as a new device.
pub fn run(path: &Path, all: bool) -> Result<(), Box<dyn std::error::Error>> {
    let persistence = super::open(path)?;

    if all {
        warn!(path = ?path, "Removing device identity");
        persistence.clear()?;
        println!("Cleared all client state at {:?}", path);
        return Ok(());
    }

    let state = ClientState::open(persistence)?;
    state.reset()?;
    println!(
        "Cleared registration and preferences of device {}",
        state.device_id()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{load, testing::sample_state};
    use pushreg_core::SyncStatus;

    #[test]
    fn reset_keeps_device_id() {
        let (dir, state) = sample_state();
        let device_id = state.device_id();
        drop(state);

        run(dir.path(), false).unwrap();
        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.device_id, device_id);
        assert_eq!(loaded.registration.status(), SyncStatus::Unregistered);
        assert!(loaded.registration.categories().is_empty());
        assert!(loaded.preferences.is_empty());
    }

    #[test]
    fn reset_all_forgets_device() {
        let (dir, state) = sample_state();
        drop(state);

        run(dir.path(), true).unwrap();
        assert!(load(dir.path()).is_err());
    }
}
