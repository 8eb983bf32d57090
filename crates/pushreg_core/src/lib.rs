//! # pushreg core
//!
//! Local client state for the pushreg registration client.
//!
//! This crate provides:
//! - The preference store with typed, declared preferences
//! - The registration state machine and its sync cycle hooks
//! - Registration fingerprints
//! - Engagement, event and push payload data model
//! - Persisted snapshots and the shared, lock-protected client state

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engagement;
mod error;
mod fingerprint;
mod persist;
mod preference;
mod push;
mod registration;
mod state;
mod types;

pub use engagement::{now_millis, EngagementMetric, EngagementRecord, EventRecord};
pub use error::{CoreError, CoreResult};
pub use fingerprint::Fingerprint;
pub use persist::{PersistedState, StatePersistence};
pub use preference::{
    validate_key, validate_label, Preference, PreferenceKind, PreferenceStore, PreferenceValue,
    MAX_KEY_LEN, MAX_LABEL_LEN, MAX_STRING_VALUE_LEN,
};
pub use push::LastPushMeta;
pub use registration::{CompletionOutcome, RegistrationState, SyncStatus};
pub use state::{ClientState, CycleKind, CyclePlan, CycleTicket, RequestContext, SkipReason};
pub use types::{DeviceId, ErrorInfo};
