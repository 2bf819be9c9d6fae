//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another handle (usually another process) holds the store's lock.
    #[error("store is locked by another owner: {}", path.display())]
    Locked {
        /// Path of the lock file.
        path: PathBuf,
    },

    /// The database name cannot be mapped to a store.
    #[error("invalid database name: {0:?}")]
    InvalidName(String),
}
