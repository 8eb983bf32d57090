//! File-based blob store for persistent client state.

use crate::error::StorageResult;
use crate::store::{validate_key, BlobStore};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const BLOB_EXTENSION: &str = "blob";
const TEMP_EXTENSION: &str = "tmp";

/// A directory-backed blob store.
///
/// Each key is stored in its own file, `<dir>/<key>.blob`. Data survives
/// process restarts.
///
/// # Durability
///
/// `save` writes to a temporary file, calls `File::sync_all()` and then
/// renames it over the previous blob, so a crash mid-save leaves the old
/// blob in place.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads. Writers are
/// serialized by an internal lock.
///
/// # Example
///
/// ```no_run
/// use pushreg_storage::{BlobStore, FileBlobStore};
/// use std::path::Path;
///
/// let store = FileBlobStore::open(Path::new("pushreg-state")).unwrap();
/// store.save("registration", b"snapshot").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBlobStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBlobStore {
    /// Opens a blob store in `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the directory holding the blobs.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{BLOB_EXTENSION}"))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{TEMP_EXTENSION}"))
    }
}

impl BlobStore for FileBlobStore {
    fn load(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        match fs::read(self.blob_path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();

        let temp = self.temp_path(key);
        {
            let mut file: File = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&temp, self.blob_path(key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();

        match fs::remove_file(self.blob_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOB_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_key(stem).is_ok() {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use tempfile::tempdir;

    #[test]
    fn file_open_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state");

        let store = FileBlobStore::open(&path).unwrap();
        assert!(path.is_dir());
        assert_eq!(store.dir(), path);
    }

    #[test]
    fn file_save_and_load() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();

        store.save("registration", b"hello world").unwrap();
        assert_eq!(
            store.load("registration").unwrap(),
            Some(b"hello world".to_vec())
        );
    }

    #[test]
    fn file_load_missing_returns_none() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();
        assert_eq!(store.load("registration").unwrap(), None);
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();

        // Write data
        {
            let store = FileBlobStore::open(dir.path()).unwrap();
            store.save("preferences", b"persistent data").unwrap();
        }

        // Reopen and read
        {
            let store = FileBlobStore::open(dir.path()).unwrap();
            assert_eq!(
                store.load("preferences").unwrap(),
                Some(b"persistent data".to_vec())
            );
        }
    }

    #[test]
    fn file_save_replaces_and_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();

        store.save("registration", b"a much longer first value").unwrap();
        store.save("registration", b"short").unwrap();

        assert_eq!(store.load("registration").unwrap(), Some(b"short".to_vec()));
        assert!(!dir.path().join("registration.tmp").exists());
    }

    #[test]
    fn file_remove() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();

        store.save("device_id", b"id").unwrap();
        store.remove("device_id").unwrap();
        assert_eq!(store.load("device_id").unwrap(), None);

        store.remove("device_id").unwrap();
    }

    #[test]
    fn file_keys_ignore_foreign_files() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();

        store.save("registration", b"r").unwrap();
        store.save("device_id", b"d").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["device_id", "registration"]);
    }

    #[test]
    fn file_invalid_key_rejected() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();

        let result = store.load("../outside");
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }
}
