//! Error types for the file source.
//!
//! - [`SourceError`] - top-level error for configuration, scanning, reading and output
//! - [`StoreError`] - metadata store failures; a poll that hits one is aborted

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Invalid or unusable configuration, fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metadata store errors (unreachable, corrupt journal, ...)
    #[error("Metadata store error: {0}")]
    Store(#[from] StoreError),

    /// The scan root could not be walked during a poll
    #[error("Scan error: {0}")]
    Scan(String),

    /// A single file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output channel rejected a message
    #[error("Output channel error: {0}")]
    Output(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Whether this error must abort the whole poll rather than a single file.
    pub fn is_store_error(&self) -> bool {
        matches!(self, SourceError::Store(_))
    }
}

/// Metadata store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store cannot be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The journal belongs to a different collection
    #[error("Collection mismatch: expected '{expected}', found '{found}'")]
    CollectionMismatch { expected: String, found: String },

    /// A journal record could not be (de)serialized
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for the file source.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Result alias for metadata store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
