//! Error types for the push manager.

use pushreg_core::CoreError;
use pushreg_storage::StorageError;
use pushreg_sync_engine::SyncError;
use thiserror::Error;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors returned by [`PushManager`](crate::PushManager).
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Local state error (validation, undefined key, type mismatch).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Sync worker error.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Persistence error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No manager was installed.
    #[error("push manager not installed")]
    NotInstalled,

    /// A manager was already installed.
    #[error("push manager already installed")]
    AlreadyInstalled,
}

impl ManagerError {
    /// Returns the numeric code of a local validation failure, if any.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Core(e) => e.code(),
            _ => None,
        }
    }
}
