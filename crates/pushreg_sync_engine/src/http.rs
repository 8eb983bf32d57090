//! HTTP transport implementation.
//!
//! The HTTP client itself is abstracted via a trait so any client library
//! (reqwest, hyper, a platform networking stack) can be plugged in.
//! Request and response bodies are CBOR.

use crate::error::{SyncError, SyncResult};
use crate::transport::Transport;
use async_trait::async_trait;
use parking_lot::RwLock;
use pushreg_protocol::{ClientMessage, ServerAck};
use tracing::debug;

/// Response of an HTTP POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request.
    ///
    /// An `Err` means no response was received.
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// HTTP-based transport.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the service (e.g., "https://api.example.com").
    base_url: String,
    client: C,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }
}

#[async_trait]
impl<C: HttpClient> Transport for HttpTransport<C> {
    async fn send(&self, message: &ClientMessage) -> SyncResult<ServerAck> {
        if !self.client.is_healthy() {
            return Err(SyncError::NotConnected);
        }

        let body = message.encode()?;
        let url = format!("{}{}", self.base_url, message.endpoint());
        debug!(%url, bytes = body.len(), "POST");

        let response = self.client.post(&url, body).await.map_err(|e| {
            self.set_error(&e);
            SyncError::transport_retryable(e)
        })?;

        if !(200..300).contains(&response.status) {
            // Servers may or may not put an ack in an error body.
            let message = ServerAck::decode(&response.body)
                .ok()
                .and_then(|ack| ack.message)
                .unwrap_or_else(|| format!("HTTP {}", response.status));
            self.set_error(&message);
            return Err(SyncError::from_status(response.status, message));
        }

        *self.last_error.write() = None;
        Ok(ServerAck::decode(&response.body)?)
    }
}

/// Servers that can answer loopback requests in-process.
pub trait LoopbackServer: Send + Sync {
    /// Handles a POST to `path`.
    fn handle_post(&self, path: &str, body: &[u8]) -> HttpResponse;
}

/// An HTTP client that routes requests directly to an in-process server.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

#[async_trait]
impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String> {
        let path = url.find("/api/").map(|i| &url[i..]).unwrap_or(url);
        Ok(self.server.handle_post(path, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushreg_protocol::DeregistrationRequest;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct TestClient {
        response: RwLock<Option<HttpResponse>>,
        healthy: AtomicBool,
        last_url: RwLock<Option<String>>,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                response: RwLock::new(None),
                healthy: AtomicBool::new(true),
                last_url: RwLock::new(None),
            }
        }

        fn set_response(&self, status: u16, body: Vec<u8>) {
            *self.response.write() = Some(HttpResponse { status, body });
        }
    }

    #[async_trait]
    impl HttpClient for TestClient {
        async fn post(&self, url: &str, _body: Vec<u8>) -> Result<HttpResponse, String> {
            *self.last_url.write() = Some(url.to_string());
            self.response
                .read()
                .clone()
                .ok_or_else(|| "connection refused".to_string())
        }

        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    fn message() -> ClientMessage {
        ClientMessage::Deregister(DeregistrationRequest::new("key", "dev"))
    }

    #[test]
    fn transport_creation() {
        let transport = HttpTransport::new("https://api.example.com/", TestClient::new());
        assert_eq!(transport.base_url(), "https://api.example.com");
    }

    #[tokio::test]
    async fn posts_to_message_endpoint() {
        let client = TestClient::new();
        client.set_response(200, ServerAck::ok().encode().unwrap());
        let transport = HttpTransport::new("https://api.example.com", client);

        let ack = transport.send(&message()).await.unwrap();
        assert!(ack.is_success());
        assert_eq!(
            transport.client.last_url.read().as_deref(),
            Some("https://api.example.com/api/v1/registrations/delete")
        );
    }

    #[tokio::test]
    async fn error_status_becomes_transport_error() {
        let client = TestClient::new();
        client.set_response(503, ServerAck::rejected(503, "maintenance").encode().unwrap());
        let transport = HttpTransport::new("https://api.example.com", client);

        let err = transport.send(&message()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(503));
        assert!(err.is_retryable());
        assert_eq!(transport.last_error().as_deref(), Some("maintenance"));
    }

    #[tokio::test]
    async fn error_status_without_ack_body() {
        let client = TestClient::new();
        client.set_response(401, b"unauthorized".to_vec());
        let transport = HttpTransport::new("https://api.example.com", client);

        let err = transport.send(&message()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(401));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn connection_failure_is_retryable() {
        let transport = HttpTransport::new("https://api.example.com", TestClient::new());
        let err = transport.send(&message()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), None);
    }

    #[tokio::test]
    async fn unhealthy_client() {
        let client = TestClient::new();
        client.healthy.store(false, Ordering::SeqCst);
        let transport = HttpTransport::new("https://api.example.com", client);
        assert!(matches!(
            transport.send(&message()).await,
            Err(SyncError::NotConnected)
        ));
    }
}
