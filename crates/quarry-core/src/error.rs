//! Error types for Quarry Core

use thiserror::Error;

/// Result type alias using Quarry's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Quarry error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Alias {alias} resolves to {count} models, expected exactly one")]
    AmbiguousAlias { alias: String, count: usize },

    #[error("Unsupported export format: {0} (supported: json, json-pretty)")]
    UnsupportedFormat(String),

    #[error("Invalid search: {0}")]
    InvalidSearch(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Fetch failed for {model}: {message}")]
    Fetch { model: String, message: String },

    #[error("Data source error: {0}")]
    Source(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<crate::limits::ValidationError> for Error {
    fn from(err: crate::limits::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}
