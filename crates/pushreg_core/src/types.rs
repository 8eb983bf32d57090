//! Small shared types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier of this installation.
///
/// Generated once and persisted; sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Generates a new random device ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Error details recorded with a failed registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Human-readable message.
    pub message: String,
    /// Server or transport status code, if any.
    pub status_code: Option<u16>,
    /// Whether a retry may succeed.
    pub retryable: bool,
}

impl ErrorInfo {
    /// Creates error info.
    pub fn new(message: impl Into<String>, status_code: Option<u16>, retryable: bool) -> Self {
        Self {
            message: message.into(),
            status_code,
            retryable,
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (status {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_ids_are_unique() {
        assert_ne!(DeviceId::generate(), DeviceId::generate());
    }

    #[test]
    fn error_info_display() {
        assert_eq!(
            ErrorInfo::new("unavailable", Some(503), true).to_string(),
            "unavailable (status 503)"
        );
        assert_eq!(ErrorInfo::new("offline", None, true).to_string(), "offline");
    }
}
