//! Process-wide manager.
//!
//! Libraries should take a [`PushManager`] explicitly. Applications that
//! need to reach it from OS callbacks install one here once, at startup.

use crate::error::{ManagerError, ManagerResult};
use crate::manager::PushManager;
use std::sync::{Arc, OnceLock};

static MANAGER: OnceLock<Arc<PushManager>> = OnceLock::new();

/// Installs the process-wide manager. Fails if one is installed.
pub fn install(manager: Arc<PushManager>) -> ManagerResult<()> {
    MANAGER
        .set(manager)
        .map_err(|_| ManagerError::AlreadyInstalled)
}

/// Returns the process-wide manager.
pub fn shared() -> ManagerResult<Arc<PushManager>> {
    MANAGER.get().cloned().ok_or(ManagerError::NotInstalled)
}

/// Returns true if a manager is installed.
pub fn is_installed() -> bool {
    MANAGER.get().is_some()
}
