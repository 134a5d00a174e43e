//! Transport error types.
//!
//! This module defines the errors that can occur while talking to the
//! search engine, along with the transient/permanent classification the
//! retry policy relies on.

use thiserror::Error;

/// Errors that can occur during search engine transport operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Failed to establish or keep a connection to the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete within the configured timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The search engine answered with a failure status.
    #[error("Remote error (status {status}): {message}")]
    RemoteError { status: u16, message: String },

    /// Failed to serialize a request or parse a response.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The transport endpoint is incomplete or invalid.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl TransportError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a remote error.
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteError {
            status,
            message: message.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create an invalid-endpoint error.
    pub fn invalid_endpoint(msg: impl Into<String>) -> Self {
        Self::InvalidEndpoint(msg.into())
    }

    /// Whether this failure is transient and worth retrying.
    ///
    /// Connection failures, timeouts, throttling (429) and 5xx-class remote
    /// failures are transient. Client errors and malformed payloads are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::Timeout(_) => true,
            Self::RemoteError { status, .. } => *status == 429 || *status >= 500,
            Self::SerializationError(_) | Self::InvalidEndpoint(_) => false,
        }
    }
}
