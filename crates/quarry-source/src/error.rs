//! Data-source error types

use thiserror::Error;

/// Result type alias for data-source operations
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Backend-specific error types
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid dataset: {0}")]
    Dataset(String),

    #[error("Injected failure for {model} page {page}")]
    Injected { model: String, page: usize },

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] ::rusqlite::Error),
}

impl From<SourceError> for quarry_core::Error {
    fn from(err: SourceError) -> Self {
        quarry_core::Error::Source(err.to_string())
    }
}
