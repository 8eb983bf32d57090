//! Cross-crate integration helpers.
//!
//! Connects clients to an in-process [`RegistrationServer`], either
//! directly or through the HTTP transport over a loopback client.

use async_trait::async_trait;
use pushreg_protocol::{ClientMessage, ServerAck};
use pushreg_sync_engine::{
    HttpResponse, HttpTransport, LoopbackClient, LoopbackServer, SyncResult, Transport,
};
use pushreg_sync_server::{RegistrationServer, ServerConfig};
use std::sync::Arc;

/// Base URL used for loopback HTTP transports.
pub const LOOPBACK_URL: &str = "https://push.test";

/// A transport that calls the server in-process.
#[derive(Clone)]
pub struct ServerTransport {
    server: Arc<RegistrationServer>,
}

impl ServerTransport {
    /// Creates a transport for `server`.
    pub fn new(server: Arc<RegistrationServer>) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &Arc<RegistrationServer> {
        &self.server
    }
}

#[async_trait]
impl Transport for ServerTransport {
    async fn send(&self, message: &ClientMessage) -> SyncResult<ServerAck> {
        Ok(self.server.handle_message(message.clone()))
    }
}

/// Exposes the server's HTTP surface to a [`LoopbackClient`].
#[derive(Clone)]
pub struct ServerLoopback(pub Arc<RegistrationServer>);

impl LoopbackServer for ServerLoopback {
    fn handle_post(&self, path: &str, body: &[u8]) -> HttpResponse {
        let (status, body) = self.0.handle_http(path, body);
        HttpResponse { status, body }
    }
}

/// Creates a server and a direct transport to it.
pub fn server_transport(config: ServerConfig) -> (Arc<RegistrationServer>, Arc<dyn Transport>) {
    let server = Arc::new(RegistrationServer::new(config));
    let transport = Arc::new(ServerTransport::new(Arc::clone(&server)));
    (server, transport)
}

/// Creates a server and an HTTP transport that reaches it over loopback.
pub fn http_server_transport(
    config: ServerConfig,
) -> (Arc<RegistrationServer>, Arc<dyn Transport>) {
    let server = Arc::new(RegistrationServer::new(config));
    let client = LoopbackClient::new(ServerLoopback(Arc::clone(&server)));
    let transport = Arc::new(HttpTransport::new(LOOPBACK_URL, client));
    (server, transport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushreg_protocol::DeregistrationRequest;

    #[tokio::test]
    async fn both_transports_reach_the_server() {
        let message = ClientMessage::Deregister(DeregistrationRequest::new("k", "dev"));

        let (server, direct) = server_transport(ServerConfig::default());
        assert!(direct.send(&message).await.unwrap().is_success());
        assert_eq!(server.request_count(), 1);

        let (server, http) = http_server_transport(ServerConfig::default());
        assert!(http.send(&message).await.unwrap().is_success());
        assert_eq!(server.request_count(), 1);
    }

    #[tokio::test]
    async fn http_transport_surfaces_rejections() {
        let (_, http) = http_server_transport(ServerConfig::new().with_api_key("good"));
        let message = ClientMessage::Deregister(DeregistrationRequest::new("bad", "dev"));
        let err = http.send(&message).await.unwrap_err();
        assert_eq!(err.status_code(), Some(401));
        assert!(!err.is_retryable());
    }
}
