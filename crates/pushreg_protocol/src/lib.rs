//! # pushreg Protocol
//!
//! Wire messages exchanged between a pushreg client and a registration
//! server.
//!
//! This crate provides:
//! - [`RegistrationRequest`] carrying the device registration tuple and,
//!   when dirty, the full preference set
//! - [`DeregistrationRequest`] for deleting a device
//! - [`TrackingBatch`] carrying engagement records and custom events
//! - [`ServerAck`] returned for every request
//! - CBOR encoding/decoding for all of the above
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod messages;
mod tracking;

pub use codec::{from_cbor, to_cbor};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    ClientMessage, DeregistrationRequest, RegistrationRequest, ServerAck, WirePreference,
    WirePreferenceKind, WireValue, PROTOCOL_VERSION,
};
pub use tracking::{TrackingBatch, WireEngagement, WireEvent};
