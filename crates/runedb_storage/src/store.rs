//! Snapshot store trait definition.

use crate::error::StorageResult;

/// A whole-object store holding the latest snapshot of one database.
///
/// # Invariants
///
/// - `load` returns exactly the bytes of the last successful `replace`
/// - `replace` is atomic: a reader (or a process restarted after a crash)
///   observes either the previous snapshot or the new one, never a mix
/// - a failed `replace` leaves the previous snapshot untouched
/// - stores must be `Send + Sync` so a database can be shared across threads
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait SnapshotStore: Send + Sync {
    /// Loads the current snapshot.
    ///
    /// Returns `None` when nothing has been written yet (or the backing
    /// object is empty), which callers treat as a fresh database.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn load(&self) -> StorageResult<Option<Vec<u8>>>;

    /// Atomically replaces the snapshot with `data`.
    ///
    /// After this returns successfully the new snapshot is durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. The previous snapshot is kept.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Human-readable location of the store, used in log lines.
    fn describe(&self) -> String;
}
