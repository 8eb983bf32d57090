//! # pushreg sync server
//!
//! In-memory reference implementation of the registration service.
//!
//! This crate provides:
//! - Registration, deregistration and tracking endpoints
//! - A device registry keyed by device ID
//! - API key validation
//! - Failure injection for exercising client retry paths
//!
//! # Protocol
//!
//! Every request is a CBOR-encoded `ClientMessage` posted to its endpoint;
//! every answer is a CBOR-encoded `ServerAck`. Registrations are
//! idempotent: the server replaces whatever it held for the device.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod registry;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use registry::{DeviceRecord, DeviceRegistry};
pub use server::RegistrationServer;
