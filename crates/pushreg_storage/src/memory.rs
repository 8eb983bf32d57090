//! In-memory blob store for testing.

use crate::error::StorageResult;
use crate::store::{validate_key, BlobStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory blob store.
///
/// This store keeps every blob in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Clients that deliberately forget their state on exit
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use pushreg_storage::{BlobStore, InMemoryBlobStore};
///
/// let store = InMemoryBlobStore::new();
/// store.save("device_id", b"abc").unwrap();
/// assert_eq!(store.keys().unwrap(), vec!["device_id".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an in-memory store with pre-existing blobs.
    ///
    /// Useful for testing restart scenarios.
    #[must_use]
    pub fn with_blobs(blobs: impl IntoIterator<Item = (String, Vec<u8>)>) -> Self {
        Self {
            blobs: RwLock::new(blobs.into_iter().collect()),
        }
    }

    /// Returns a copy of every blob in the store.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.blobs.read().clone()
    }

    /// Returns the number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Returns true if the store holds no blobs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn load(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.blobs.read().get(key).cloned())
    }

    fn save(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        self.blobs.write().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.blobs.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.blobs.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryBlobStore::new();
        assert!(store.is_empty());
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn memory_load_missing_returns_none() {
        let store = InMemoryBlobStore::new();
        assert_eq!(store.load("registration").unwrap(), None);
    }

    #[test]
    fn memory_save_replaces_previous_blob() {
        let store = InMemoryBlobStore::new();
        store.save("registration", b"first").unwrap();
        store.save("registration", b"second").unwrap();

        assert_eq!(store.load("registration").unwrap(), Some(b"second".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn memory_remove() {
        let store = InMemoryBlobStore::new();
        store.save("preferences", b"data").unwrap();
        store.remove("preferences").unwrap();
        assert_eq!(store.load("preferences").unwrap(), None);

        // Removing again is fine
        store.remove("preferences").unwrap();
    }

    #[test]
    fn memory_keys_are_sorted() {
        let store = InMemoryBlobStore::new();
        store.save("registration", b"r").unwrap();
        store.save("device_id", b"d").unwrap();
        store.save("preferences", b"p").unwrap();

        assert_eq!(
            store.keys().unwrap(),
            vec!["device_id", "preferences", "registration"]
        );
    }

    #[test]
    fn memory_with_blobs() {
        let store = InMemoryBlobStore::with_blobs([("device_id".to_string(), b"id".to_vec())]);
        assert_eq!(store.load("device_id").unwrap(), Some(b"id".to_vec()));
    }

    #[test]
    fn memory_invalid_key_rejected() {
        let store = InMemoryBlobStore::new();
        let result = store.save("../etc", b"x");
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn memory_empty_blob() {
        let store = InMemoryBlobStore::new();
        store.save("empty", b"").unwrap();
        assert_eq!(store.load("empty").unwrap(), Some(Vec::new()));
    }
}
