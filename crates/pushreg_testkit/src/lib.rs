//! # pushreg testkit
//!
//! Test utilities for pushreg.
//!
//! This crate provides:
//! - Temporary file-backed stores and push payload fixtures
//! - Property-based test generators using proptest
//! - Transports backed by the in-memory registration server
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pushreg_testkit::prelude::*;
//!
//! let (server, transport) = server_transport(ServerConfig::default());
//! let store = TestStore::new();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
