//! Test fixtures.
//!
//! Provides temporary stores, push payloads and sample tokens.

use pushreg_storage::FileBlobStore;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// A sample push token.
pub const SAMPLE_TOKEN: [u8; 8] = [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0x02, 0x03];

/// A file-backed store in a temporary directory.
pub struct TestStore {
    /// The store.
    pub store: Arc<FileBlobStore>,
    temp_dir: TempDir,
}

impl TestStore {
    /// Creates a store in a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileBlobStore::open(temp_dir.path()).expect("Failed to open blob store");
        Self {
            store: Arc::new(store),
            temp_dir,
        }
    }

    /// Returns the store directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Opens a second store over the same directory, as a restart would.
    pub fn reopen(&self) -> Arc<FileBlobStore> {
        Arc::new(FileBlobStore::open(self.path()).expect("Failed to reopen blob store"))
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a temporary file-backed store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&TestStore) -> R,
{
    let store = TestStore::new();
    f(&store)
}

/// Builds remote notification payloads.
#[derive(Debug, Clone)]
pub struct PushPayload {
    engagement_id: String,
    alert: Option<String>,
    sound: Option<String>,
    badge: Option<u32>,
    content_available: bool,
}

impl PushPayload {
    /// Starts a payload carrying `engagement_id`.
    pub fn new(engagement_id: impl Into<String>) -> Self {
        Self {
            engagement_id: engagement_id.into(),
            alert: None,
            sound: None,
            badge: None,
            content_available: false,
        }
    }

    /// Sets the alert text.
    pub fn alert(mut self, text: impl Into<String>) -> Self {
        self.alert = Some(text.into());
        self
    }

    /// Sets the sound file name.
    pub fn sound(mut self, name: impl Into<String>) -> Self {
        self.sound = Some(name.into());
        self
    }

    /// Sets the badge.
    pub fn badge(mut self, badge: u32) -> Self {
        self.badge = Some(badge);
        self
    }

    /// Marks the push as announcing new content.
    pub fn content_available(mut self) -> Self {
        self.content_available = true;
        self
    }

    /// Builds the JSON payload.
    pub fn build(&self) -> Value {
        let mut aps = serde_json::Map::new();
        if let Some(alert) = &self.alert {
            aps.insert("alert".into(), json!(alert));
        }
        if let Some(sound) = &self.sound {
            aps.insert("sound".into(), json!(sound));
        }
        if let Some(badge) = self.badge {
            aps.insert("badge".into(), json!(badge));
        }
        if self.content_available {
            aps.insert("content-available".into(), json!(1));
        }
        json!({ "aps": aps, "ei": self.engagement_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushreg_core::LastPushMeta;
    use pushreg_storage::BlobStore;

    #[test]
    fn payload_parses() {
        let payload = PushPayload::new("e-1")
            .alert("Hello")
            .sound("ding.caf")
            .badge(3)
            .content_available()
            .build();
        let meta = LastPushMeta::from_payload(&payload).unwrap();
        assert_eq!(meta.engagement_id, "e-1");
        assert_eq!(meta.alert_text.as_deref(), Some("Hello"));
        assert_eq!(meta.sound_file_name.as_deref(), Some("ding.caf"));
        assert_eq!(meta.badge_update.as_deref(), Some("3"));
        assert!(meta.content_available);
    }

    #[test]
    fn reopened_store_sees_writes() {
        with_temp_store(|test| {
            test.store.save("k", b"v").unwrap();
            assert_eq!(test.reopen().load("k").unwrap(), Some(b"v".to_vec()));
        });
    }
}
