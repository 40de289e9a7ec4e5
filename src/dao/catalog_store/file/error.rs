//! Error types for the flat-file question bank.

use std::path::PathBuf;

use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`FileDaoError`] failures.
pub type FileResult<T> = Result<T, FileDaoError>;

/// Failures that can occur while reading or writing the bank files.
#[derive(Debug, Error)]
pub enum FileDaoError {
    /// The data directory could not be created or inspected.
    #[error("data directory `{path}` is not usable")]
    DataDir {
        /// Offending path.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// A bank file exists but could not be read.
    #[error("failed to read `{path}`")]
    Read {
        /// Offending path.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// A bank file could not be written or swapped into place.
    #[error("failed to write `{path}`")]
    Write {
        /// Offending path.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// A bank file does not contain the expected JSON array.
    #[error("failed to decode `{path}`")]
    Decode {
        /// Offending path.
        path: PathBuf,
        /// JSON failure.
        #[source]
        source: serde_json::Error,
    },
    /// Serialising the new file contents failed.
    #[error("failed to encode `{path}`")]
    Encode {
        /// Offending path.
        path: PathBuf,
        /// JSON failure.
        #[source]
        source: serde_json::Error,
    },
}

impl From<FileDaoError> for StorageError {
    fn from(err: FileDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
