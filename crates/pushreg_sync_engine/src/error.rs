//! Error types for the sync engine.

use pushreg_core::ErrorInfo;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error, or a non-2xx server answer.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
        /// Server status code, if the server answered.
        status_code: Option<u16>,
    },

    /// Message could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] pushreg_protocol::ProtocolError),

    /// Local state error.
    #[error("state error: {0}")]
    Core(#[from] pushreg_core::CoreError),

    /// The request did not complete in time.
    #[error("operation timed out")]
    Timeout,

    /// The engine worker is gone.
    #[error("sync worker stopped")]
    ChannelClosed,

    /// Not connected.
    #[error("not connected to server")]
    NotConnected,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
            status_code: None,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
            status_code: None,
        }
    }

    /// Creates an error from a non-2xx server status.
    ///
    /// 408, 429 and 5xx are retryable; other statuses are not.
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let retryable = matches!(status_code, 408 | 429 | 500..=599);
        Self::Transport {
            message: message.into(),
            retryable,
            status_code: Some(status_code),
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout | SyncError::NotConnected => true,
            _ => false,
        }
    }

    /// Returns the server status code, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SyncError::Transport { status_code, .. } => *status_code,
            _ => None,
        }
    }

    /// Converts to the error info recorded in registration state.
    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.to_string(), self.status_code(), self.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection lost").is_retryable());
        assert!(!SyncError::transport_fatal("invalid certificate").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(!SyncError::ChannelClosed.is_retryable());
    }

    #[test]
    fn status_classification() {
        assert!(SyncError::from_status(503, "unavailable").is_retryable());
        assert!(SyncError::from_status(500, "boom").is_retryable());
        assert!(SyncError::from_status(429, "slow down").is_retryable());
        assert!(SyncError::from_status(408, "timeout").is_retryable());
        assert!(!SyncError::from_status(401, "bad key").is_retryable());
        assert!(!SyncError::from_status(422, "bad request").is_retryable());
        assert_eq!(SyncError::from_status(404, "x").status_code(), Some(404));
    }

    #[test]
    fn error_info_conversion() {
        let info = SyncError::from_status(503, "maintenance").to_error_info();
        assert_eq!(info.status_code, Some(503));
        assert!(info.retryable);
        assert!(info.message.contains("maintenance"));

        assert_eq!(SyncError::Timeout.to_error_info().status_code, None);
    }
}
