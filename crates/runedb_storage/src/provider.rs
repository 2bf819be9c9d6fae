//! Name-to-store resolution supplied by the host.

use crate::error::{StorageError, StorageResult};
use crate::file::FileStore;
use crate::memory::InMemoryStore;
use crate::store::SnapshotStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// File extension used by [`DirectoryProvider`].
pub const FILE_EXTENSION: &str = "runedb";

/// Resolves a database name into the store that backs it.
///
/// The engine never turns names into paths itself; the host injects a
/// provider and the engine asks it for a store whenever a database is opened.
pub trait StoreProvider: Send + Sync {
    /// Opens the store for `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not acceptable to this provider or
    /// the store cannot be opened (for example because it is locked).
    fn open(&self, name: &str) -> StorageResult<Box<dyn SnapshotStore>>;
}

/// Rejects empty names and names that could escape a directory.
fn validate_name(name: &str) -> StorageResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(|c: char| matches!(c, '/' | '\\' | '\0'));
    if bad {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Keeps one [`InMemoryStore`] per name for the lifetime of the provider.
///
/// Reopening a name returns a store sharing the earlier snapshot, which lets
/// tests exercise close/reopen without touching the file system.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    stores: Mutex<HashMap<String, InMemoryStore>>,
}

impl MemoryProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the store for `name`, creating it if needed.
    ///
    /// The returned store shares its snapshot with every store this provider
    /// hands out for the same name.
    #[must_use]
    pub fn store(&self, name: &str) -> InMemoryStore {
        self.stores
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

impl StoreProvider for MemoryProvider {
    fn open(&self, name: &str) -> StorageResult<Box<dyn SnapshotStore>> {
        validate_name(name)?;
        Ok(Box::new(self.store(name)))
    }
}

/// Stores each database as `<dir>/<name>.runedb`.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    dir: PathBuf,
}

impl DirectoryProvider {
    /// Creates a provider rooted at `dir`.
    ///
    /// The directory is created lazily on the first open.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory holding the database files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path used for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidName`] for names that could escape the
    /// directory.
    pub fn path_for(&self, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{name}.{FILE_EXTENSION}")))
    }
}

impl StoreProvider for DirectoryProvider {
    fn open(&self, name: &str) -> StorageResult<Box<dyn SnapshotStore>> {
        let path = self.path_for(name)?;
        Ok(Box::new(FileStore::open_with_create_dirs(&path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_provider_shares_per_name() {
        let provider = MemoryProvider::new();

        let mut first = provider.open("notes").unwrap();
        first.replace(b"hello").unwrap();
        drop(first);

        let again = provider.open("notes").unwrap();
        assert_eq!(again.load().unwrap().unwrap(), b"hello");

        let other = provider.open("other").unwrap();
        assert!(other.load().unwrap().is_none());
    }

    #[test]
    fn invalid_names_rejected() {
        let provider = MemoryProvider::new();
        for name in ["", ".", "..", "a/b", "a\\b"] {
            assert!(
                matches!(provider.open(name), Err(StorageError::InvalidName(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn directory_provider_paths() {
        let provider = DirectoryProvider::new("/var/lib/app");
        assert_eq!(
            provider.path_for("notes").unwrap(),
            PathBuf::from("/var/lib/app/notes.runedb")
        );
        assert!(provider.path_for("../etc/passwd").is_err());
    }

    #[test]
    fn directory_provider_creates_dir() {
        let temp = tempdir().unwrap();
        let provider = DirectoryProvider::new(temp.path().join("data"));

        let mut store = provider.open("notes").unwrap();
        store.replace(b"{}").unwrap();

        assert!(temp.path().join("data").join("notes.runedb").exists());
    }

    #[test]
    fn directory_provider_locks_name() {
        let temp = tempdir().unwrap();
        let provider = DirectoryProvider::new(temp.path());

        let _held = provider.open("notes").unwrap();
        assert!(matches!(
            provider.open("notes"),
            Err(StorageError::Locked { .. })
        ));
    }
}
