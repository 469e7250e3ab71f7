//! Error types for datasets and experiments

use thiserror::Error;

/// Error type for dataset operations
#[derive(Error, Debug)]
pub enum Error {
    /// Core library error (transport, HTTP status, JSON, settings)
    #[error(transparent)]
    Core(#[from] ml_studio_core::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV format error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// No serializer exists for the data type id
    #[error("Dataset type \"{0}\" is not supported")]
    UnsupportedDatasetType(String),

    /// Malformed tabular content
    #[error("Format error: {0}")]
    Format(String),

    /// No dataset or experiment matches the lookup
    #[error("{0}")]
    NotFound(String),

    /// Operation not allowed on this dataset
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Core(err.into())
    }
}

/// Result type for dataset operations
pub type Result<T> = std::result::Result<T, Error>;
