//! Storage error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error for {path}: {source}")]
    Serialization {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("asset {url} has no downloaded data")]
    MissingAssetData { url: String },

    #[error("document name {name:?} already used by {existing} in this run, refusing to overwrite it with {url}")]
    NameCollision {
        name: String,
        existing: String,
        url: String,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
