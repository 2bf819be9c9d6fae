//! Error types for RuneDB core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in RuneDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] runedb_storage::StorageError),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] runedb_codec::CodecError),

    /// I/O error outside the store, such as spawning the flusher thread.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The secret or key string cannot be used to derive a key.
    #[error("invalid secret: {message}")]
    InvalidSecret {
        /// Description of the problem.
        message: String,
    },

    /// Key derivation failed inside the KDF.
    #[error("key derivation failed: {message}")]
    KeyDerivationFailed {
        /// Description of the failure.
        message: String,
    },

    /// Invalid key size.
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Expected size in bytes.
        expected: usize,
        /// Actual size in bytes.
        actual: usize,
    },

    /// Encryption failed.
    #[error("encryption failed: {message}")]
    EncryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// Decryption failed: wrong or absent key, or tampered bytes.
    #[error("decryption failed: {message}")]
    DecryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// A record with the same id already exists.
    #[error("duplicate id {id} in collection {collection}")]
    DuplicateId {
        /// Name of the collection.
        collection: String,
        /// The conflicting id, rendered as JSON.
        id: String,
    },

    /// Nothing matched the selector of an update.
    #[error("no match for {selector} in {store}")]
    NotFound {
        /// Name of the collection or map.
        store: String,
        /// The selector, rendered for diagnostics.
        selector: String,
    },

    /// Persisted bytes cannot be parsed.
    #[error("corrupt store: {message}")]
    CorruptStore {
        /// Description of the corruption.
        message: String,
    },

    /// Another handle or process holds the store.
    #[error("database locked: {name}")]
    DatabaseLocked {
        /// Name of the database.
        name: String,
    },

    /// Database is closed.
    #[error("database is closed")]
    DatabaseClosed,

    /// The database does not exist and `create_if_missing` is false.
    #[error("database not found: {name}")]
    DatabaseNotFound {
        /// Name of the database.
        name: String,
    },

    /// The database exists and `error_if_exists` is true.
    #[error("database already exists: {name}")]
    DatabaseExists {
        /// Name of the database.
        name: String,
    },

    /// A root key already holds a different kind of store.
    #[error("{name} is a {actual}, not a {expected}")]
    KindMismatch {
        /// The root key.
        name: String,
        /// Kind the caller asked for.
        expected: &'static str,
        /// Kind found in the document.
        actual: &'static str,
    },

    /// A collection record is not a well-formed map.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of the problem.
        message: String,
    },

    /// A root document is not a map or contains unstorable values.
    #[error("invalid document: {message}")]
    InvalidDocument {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid secret error.
    pub fn invalid_secret(message: impl Into<String>) -> Self {
        Self::InvalidSecret {
            message: message.into(),
        }
    }

    /// Creates a key derivation failed error.
    pub fn key_derivation_failed(message: impl Into<String>) -> Self {
        Self::KeyDerivationFailed {
            message: message.into(),
        }
    }

    /// Creates an invalid key size error.
    pub fn invalid_key_size(actual: usize, expected: usize) -> Self {
        Self::InvalidKeySize { expected, actual }
    }

    /// Creates an encryption failed error.
    pub fn encryption_failed(message: impl Into<String>) -> Self {
        Self::EncryptionFailed {
            message: message.into(),
        }
    }

    /// Creates a decryption failed error.
    pub fn decryption_failed(message: impl Into<String>) -> Self {
        Self::DecryptionFailed {
            message: message.into(),
        }
    }

    /// Creates a duplicate id error.
    pub fn duplicate_id(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::DuplicateId {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(store: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::NotFound {
            store: store.into(),
            selector: selector.into(),
        }
    }

    /// Creates a corrupt store error.
    pub fn corrupt_store(message: impl Into<String>) -> Self {
        Self::CorruptStore {
            message: message.into(),
        }
    }

    /// Creates a kind mismatch error.
    pub fn kind_mismatch(name: impl Into<String>, expected: &'static str, actual: &'static str) -> Self {
        Self::KindMismatch {
            name: name.into(),
            expected,
            actual,
        }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates an invalid document error.
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runedb_storage::StorageError;

    #[test]
    fn messages_name_the_store() {
        let err = CoreError::duplicate_id("items", "\"a\"");
        assert_eq!(err.to_string(), "duplicate id \"a\" in collection items");

        let err = CoreError::kind_mismatch("settings", "collection", "map");
        assert_eq!(err.to_string(), "settings is a map, not a collection");
    }

    #[test]
    fn storage_errors_convert() {
        let err: CoreError = StorageError::InvalidName("..".into()).into();
        assert!(matches!(err, CoreError::Storage(_)));
    }
}
