//! Error types for ML Studio clients

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for ML Studio client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for ML Studio client operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The underlying HTTP client failed before a response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// A global referenced by an inline function has no value in its context
    #[error("Missing dependency: global `{symbol}` is referenced but not defined")]
    MissingDependency {
        /// Name of the unresolved global
        symbol: String,
    },

    /// An attachment names an on-disk source that does not exist
    #[error("Attachment not found: {}", path.display())]
    AttachmentNotFound {
        /// Path that could not be read
        path: PathBuf,
    },

    /// Two attachments share a destination name
    #[error("Duplicate attachment destination: {0}")]
    DuplicateAttachment(String),

    /// The service rejected the request because of a name collision (HTTP 409)
    #[error("Conflict: {message}")]
    Conflict {
        /// Human readable description of the collision
        message: String,
        /// Raw response body
        body: String,
    },

    /// Non-success HTTP response
    #[error("HTTP error {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Well-formed response that lacks an expected field
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A value does not match its declared interop type
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Settings could not be resolved
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    /// Whether this error is an HTTP 401 from the service
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Http { status: 401, .. })
    }

    /// Status code carried by HTTP-level errors
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::Conflict { .. } => Some(409),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}
