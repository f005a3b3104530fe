//! Error types for murmur.

use thiserror::Error;

/// Result type alias using murmur's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for murmur operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Required field missing or malformed (user-correctable).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing, malformed, or expired bearer token.
    ///
    /// Deliberately covers all three cases with one variant: the caller must
    /// not be able to distinguish "expired" from "never valid".
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Note absent, or owned by someone else. The two are indistinguishable.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Blob write or record write failed (retryable).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Microphone access denied or absent.
    #[error("Recording device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Speech engine failed mid-session. Non-fatal: finalized transcript text
    /// is preserved by the caller.
    #[error("Transcription error: {0}")]
    Transcription(String),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
