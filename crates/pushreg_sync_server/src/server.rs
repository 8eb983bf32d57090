//! Main registration server.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handler::{HandlerContext, RequestHandler};
use crate::registry::DeviceRegistry;
use pushreg_protocol::{ClientMessage, ServerAck};
use std::sync::Arc;
use tracing::warn;

/// The registration server.
///
/// Handles registration, deregistration and tracking messages against an
/// in-memory device registry.
///
/// # Example
///
/// ```
/// use pushreg_sync_server::{RegistrationServer, ServerConfig};
///
/// let server = RegistrationServer::new(ServerConfig::default());
///
/// // Expose `handle_http` behind real HTTP endpoints, or call
/// // `handle_message` directly from an in-process transport.
/// assert_eq!(server.registry().len(), 0);
/// ```
pub struct RegistrationServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl RegistrationServer {
    /// Creates a new server.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry(config, Arc::new(DeviceRegistry::new()))
    }

    /// Creates a server over an existing registry.
    pub fn with_registry(config: ServerConfig, registry: Arc<DeviceRegistry>) -> Self {
        let context = Arc::new(HandlerContext::new(config, registry));
        let handler = RequestHandler::new(Arc::clone(&context));
        Self { handler, context }
    }

    /// Handles a message; errors become rejections.
    pub fn handle_message(&self, message: ClientMessage) -> ServerAck {
        match self.handler.handle(message) {
            Ok(ack) => ack,
            Err(e) => ServerAck::rejected(e.status_code(), e.to_string()),
        }
    }

    /// Handles a POST of a CBOR body to `path`. Returns status and CBOR body.
    pub fn handle_http(&self, path: &str, body: &[u8]) -> (u16, Vec<u8>) {
        let ack = match ClientMessage::decode(body) {
            Ok(message) if message.endpoint() == path => self.handle_message(message),
            Ok(_) => {
                let err = ServerError::NotFound(path.to_string());
                ServerAck::rejected(err.status_code(), err.to_string())
            }
            Err(e) => {
                let err = ServerError::from(e);
                ServerAck::rejected(err.status_code(), err.to_string())
            }
        };

        match ack.encode() {
            Ok(bytes) => (ack.status_code, bytes),
            Err(e) => {
                warn!(error = %e, "Failed to encode acknowledgement");
                (500, Vec::new())
            }
        }
    }

    /// Answers the next `count` requests with `status`.
    pub fn inject_failures(&self, status: u16, count: usize) {
        self.context.inject_failures(status, count);
    }

    /// Returns the number of requests received.
    pub fn request_count(&self) -> u64 {
        self.context.request_count()
    }

    /// Returns the device registry.
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.context.registry
    }
}
