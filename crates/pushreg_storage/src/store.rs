//! Blob store trait definition.

use crate::error::{StorageError, StorageResult};

/// Maximum length of a blob key.
pub const MAX_KEY_LEN: usize = 64;

/// A key/value store for opaque snapshot blobs.
///
/// # Invariants
///
/// - `save` replaces any previous blob under the key atomically
/// - `load` returns exactly the bytes of the last successful `save`
/// - `remove` of a missing key is not an error
/// - Keys are validated with [`validate_key`] by every implementation
///
/// # Implementors
///
/// - [`super::InMemoryBlobStore`] - For testing
/// - [`super::FileBlobStore`] - For persistent storage
pub trait BlobStore: Send + Sync {
    /// Loads the blob stored under `key`.
    ///
    /// Returns `Ok(None)` if nothing has been saved under the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn load(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Saves `data` under `key`, replacing any previous blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the write fails.
    fn save(&self, key: &str, data: &[u8]) -> StorageResult<()>;

    /// Removes the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the removal fails.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Returns all keys currently holding a blob, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    fn keys(&self) -> StorageResult<Vec<String>>;
}

/// Checks that a key is usable by every store implementation.
///
/// Keys are 1 to [`MAX_KEY_LEN`] characters of `[a-z0-9_.-]` and never start
/// with a dot, so they map directly onto file names.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] when the key breaks those rules.
pub fn validate_key(key: &str) -> StorageResult<()> {
    let valid_chars = key
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.'));

    if key.is_empty() || key.len() > MAX_KEY_LEN || !valid_chars || key.starts_with('.') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_keys() {
        assert!(validate_key("registration").is_ok());
        assert!(validate_key("device_id").is_ok());
        assert!(validate_key("prefs-v1.cbor").is_ok());
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(validate_key("").is_err());
        assert!(validate_key(".hidden").is_err());
        assert!(validate_key("../escape").is_err());
        assert!(validate_key("Upper").is_err());
        assert!(validate_key(&"k".repeat(MAX_KEY_LEN + 1)).is_err());
    }
}
