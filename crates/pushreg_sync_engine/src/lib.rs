//! # pushreg sync engine
//!
//! Turns local registration state into a confirmed server registration,
//! and forwards engagement metrics and events.
//!
//! This crate provides:
//! - The registration sync worker (debounce, retry with exponential
//!   backoff, follow-up cycles, superseded completions)
//! - The engagement and event tracker with a bounded queue
//! - The observer registry
//! - The transport abstraction, an HTTP transport and a mock transport
//!
//! ## Key Invariants
//!
//! - At most one registration request is in flight
//! - A mutation during a request never cancels it; it queues exactly one
//!   follow-up cycle
//! - An explicit unregister makes in-flight completions no-ops
//! - Transport failures surface only through observers

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod http;
mod observer;
mod tracker;
mod transport;

pub use config::{RetryConfig, SyncConfig, TrackerConfig};
pub use engine::{SyncEngine, SyncReport, SyncStats};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer};
pub use observer::{EventKind, ObserverRegistry, RegistrationEvent, Subscriber, SubscriberId};
pub use tracker::EventTracker;
pub use transport::{MockTransport, Transport};
