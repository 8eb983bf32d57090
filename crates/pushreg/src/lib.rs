//! # pushreg
//!
//! Client for a push notification registration service.
//!
//! This crate provides:
//! - [`PushManager`]: categories, user ID, preferences and push token,
//!   synced to the service with debounce, retry and backoff
//! - Engagement and event tracking attributed to the last processed push
//! - Observers for registration outcomes and processed pushes
//! - A process-wide accessor in [`global`] for application wiring
//!
//! The transport is pluggable: any [`Transport`], including an
//! [`HttpTransport`] over an application-provided HTTP client.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
pub mod global;
mod manager;

pub use config::{DebugLevel, ManagerConfig, DEFAULT_API_HOST};
pub use error::{ManagerError, ManagerResult};
pub use manager::{PushManager, FRAMEWORK_VERSION};

pub use pushreg_core::{
    DeviceId, EngagementMetric, ErrorInfo, LastPushMeta, Preference, PreferenceKind,
    PreferenceValue, SyncStatus,
};
pub use pushreg_storage::{BlobStore, FileBlobStore, InMemoryBlobStore};
pub use pushreg_sync_engine::{
    EventKind, HttpClient, HttpResponse, HttpTransport, RegistrationEvent, RetryConfig,
    Subscriber, SubscriberId, SyncConfig, SyncReport, SyncStats, TrackerConfig, Transport,
};
