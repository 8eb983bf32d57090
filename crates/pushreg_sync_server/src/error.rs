//! Error types for the registration server.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the registration server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown API key.
    #[error("unknown api key")]
    Unauthorized,

    /// Unknown endpoint.
    #[error("no such endpoint: {0}")]
    NotFound(String),

    /// Request could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] pushreg_protocol::ProtocolError),

    /// Failure injected through configuration.
    #[error("injected failure")]
    Injected {
        /// Status code to answer with.
        status: u16,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 422,
            ServerError::Unauthorized => 401,
            ServerError::NotFound(_) => 404,
            ServerError::Protocol(_) => 400,
            ServerError::Injected { status } => *status,
            ServerError::Internal(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code())
    }
}
