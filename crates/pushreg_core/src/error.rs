//! Error types for pushreg core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in local client state operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A key, label or value failed validation.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the problem.
        message: String,
    },

    /// The preference key was never declared.
    #[error("undefined preference key: {key}")]
    UndefinedKey {
        /// The key that was looked up.
        key: String,
    },

    /// A value of the wrong type was assigned to a preference.
    #[error("type mismatch for {key}: declared {expected}, got {actual}")]
    TypeMismatch {
        /// The preference key.
        key: String,
        /// Declared type.
        expected: &'static str,
        /// Type of the rejected value.
        actual: &'static str,
    },

    /// A sync completion arrived for a superseded cycle.
    #[error("state conflict: cycle epoch {cycle_epoch} superseded by {current_epoch}")]
    StateConflict {
        /// Epoch the cycle was started in.
        cycle_epoch: u64,
        /// Epoch the state is now in.
        current_epoch: u64,
    },

    /// A push payload could not be processed.
    #[error("invalid push payload: {message}")]
    PushPayload {
        /// Description of the problem.
        message: String,
    },

    /// Persisted state could not be decoded.
    #[error("corrupted state under {key}: {message}")]
    Corrupted {
        /// Blob key.
        key: String,
        /// Decoder message.
        message: String,
    },

    /// CBOR encoding failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] pushreg_storage::StorageError),
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns true if this error reports a superseded sync cycle.
    pub fn is_state_conflict(&self) -> bool {
        matches!(self, Self::StateConflict { .. })
    }

    /// Returns the numeric error code for preference errors.
    ///
    /// Validation failures are `501`, undefined keys `502`.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Validation { .. } | Self::TypeMismatch { .. } => Some(501),
            Self::UndefinedKey { .. } => Some(502),
            _ => None,
        }
    }
}
