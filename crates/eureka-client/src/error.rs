//! Error types for the eureka client

use thiserror::Error;

/// Eureka client error type
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure after retries were exhausted
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Failure to complete an HTTP exchange with the registry.
///
/// HTTP status codes are not transport errors; a response with any status
/// is a completed exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not establish a connection
    #[error("connection failed: {reason}")]
    ConnectionFailed {
        /// Underlying reason
        reason: String,
    },

    /// Request did not complete in time
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that was exceeded
        timeout_ms: u64,
    },

    /// URL could not be parsed
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL
        url: String,
    },

    /// Any other request failure
    #[error("request failed: {reason}")]
    RequestFailed {
        /// Underlying reason
        reason: String,
    },
}

impl TransportError {
    /// Create a connection failure
    pub fn connection(reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            reason: reason.into(),
        }
    }

    /// Create a generic request failure
    pub fn request(reason: impl Into<String>) -> Self {
        Self::RequestFailed {
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
