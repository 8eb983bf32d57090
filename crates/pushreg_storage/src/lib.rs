//! # pushreg Storage
//!
//! Persistence collaborator for the pushreg client.
//!
//! The client keeps a handful of small snapshots (registration state,
//! declared preferences, device identity) that must survive process
//! restarts. Stores in this crate are **opaque blob stores**: they map a
//! short key to a byte blob and never interpret the bytes.
//!
//! ## Design Principles
//!
//! - One blob per key, replaced wholesale on every save
//! - A save is atomic: readers see the old blob or the new one, never a mix
//! - Must be `Send + Sync`; the client shares one store across threads
//! - Encoding of the blobs belongs to `pushreg_core`
//!
//! ## Available Stores
//!
//! - [`InMemoryBlobStore`] - For tests and ephemeral clients
//! - [`FileBlobStore`] - One file per key inside a directory
//!
//! ## Example
//!
//! ```rust
//! use pushreg_storage::{BlobStore, InMemoryBlobStore};
//!
//! let store = InMemoryBlobStore::new();
//! store.save("registration", b"snapshot").unwrap();
//! assert_eq!(store.load("registration").unwrap(), Some(b"snapshot".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileBlobStore;
pub use memory::InMemoryBlobStore;
pub use store::{validate_key, BlobStore, MAX_KEY_LEN};
