//! In-memory snapshot store for testing.

use crate::error::StorageResult;
use crate::store::SnapshotStore;
use parking_lot::RwLock;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Shared {
    data: RwLock<Option<Vec<u8>>>,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

/// An in-memory snapshot store.
///
/// Clones share the same underlying snapshot, so a test can keep one clone,
/// hand another to a database, and later reopen from the first one to
/// simulate a restart.
///
/// # Example
///
/// ```rust
/// use runedb_storage::{InMemoryStore, SnapshotStore};
///
/// let mut store = InMemoryStore::new();
/// let observer = store.clone();
/// store.replace(b"test data").unwrap();
/// assert_eq!(observer.data().as_deref(), Some(&b"test data"[..]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds a snapshot.
    ///
    /// Useful for testing decode and recovery paths.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        let store = Self::default();
        *store.shared.data.write() = Some(data);
        store
    }

    /// Returns a copy of the current snapshot bytes.
    #[must_use]
    pub fn data(&self) -> Option<Vec<u8>> {
        self.shared.data.read().clone()
    }

    /// Makes every subsequent `replace` fail with an I/O error.
    ///
    /// Used to exercise failed-flush handling.
    pub fn fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `replace` calls.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.shared.writes.load(Ordering::SeqCst)
    }
}

impl SnapshotStore for InMemoryStore {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        Ok(self
            .shared
            .data
            .read()
            .as_ref()
            .filter(|data| !data.is_empty())
            .cloned())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("injected write failure").into());
        }
        *self.shared.data.write() = Some(data.to_vec());
        self.shared.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.load().unwrap().is_none());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn replace_overwrites() {
        let mut store = InMemoryStore::new();
        store.replace(b"one").unwrap();
        store.replace(b"two").unwrap();

        assert_eq!(store.load().unwrap().unwrap(), b"two");
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn clones_share_snapshot() {
        let mut writer = InMemoryStore::new();
        let reader = writer.clone();

        writer.replace(b"shared").unwrap();
        assert_eq!(reader.load().unwrap().unwrap(), b"shared");
    }

    #[test]
    fn with_data_preloads() {
        let store = InMemoryStore::with_data(b"seed".to_vec());
        assert_eq!(store.load().unwrap().unwrap(), b"seed");
    }

    #[test]
    fn empty_snapshot_loads_none() {
        let store = InMemoryStore::with_data(Vec::new());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn injected_failure_keeps_previous_snapshot() {
        let mut store = InMemoryStore::new();
        store.replace(b"good").unwrap();

        store.fail_writes(true);
        assert!(store.replace(b"bad").is_err());
        assert_eq!(store.load().unwrap().unwrap(), b"good");

        store.fail_writes(false);
        store.replace(b"better").unwrap();
        assert_eq!(store.load().unwrap().unwrap(), b"better");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn last_replace_wins(snapshots in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 1..10)) {
                let mut store = InMemoryStore::new();
                for snapshot in &snapshots {
                    store.replace(snapshot).unwrap();
                }
                let loaded = store.load().unwrap();
                prop_assert_eq!(loaded.as_ref(), snapshots.last());
            }
        }
    }
}
