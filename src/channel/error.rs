//! Channel Error Types
//!
//! Errors surfaced by requests sent to the backend process.

use thiserror::Error;

/// Backend channel errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    // Transport errors
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection timeout after {0}ms")]
    ConnectionTimeout(u64),

    #[error("Transport error: {0}")]
    TransportError(String),

    // Protocol errors
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("Backend error {code}: {message}")]
    Rejected { code: i32, message: String },

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    // Configuration errors
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Event stream closed")]
    StreamClosed,
}

impl ChannelError {
    /// Build a rejection from a backend error payload
    pub fn rejected(code: i32, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChannelError::ConnectionTimeout(30000)
        } else if err.is_connect() {
            ChannelError::ConnectionFailed(err.to_string())
        } else if err.is_decode() {
            ChannelError::DeserializationError(err.to_string())
        } else {
            ChannelError::TransportError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(err: serde_json::Error) -> Self {
        ChannelError::DeserializationError(err.to_string())
    }
}

impl From<url::ParseError> for ChannelError {
    fn from(err: url::ParseError) -> Self {
        ChannelError::InvalidEndpoint(err.to_string())
    }
}

/// Result type alias for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;
