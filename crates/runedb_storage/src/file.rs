//! File-based snapshot store.

use crate::error::{StorageError, StorageResult};
use crate::store::SnapshotStore;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix of the temporary file written before the atomic rename.
const TEMP_SUFFIX: &str = "tmp";
/// Suffix of the advisory lock file.
const LOCK_SUFFIX: &str = "lock";

/// A single-file snapshot store.
///
/// The snapshot lives in one file. Replacing it uses the write-then-rename
/// pattern:
/// 1. Write the new bytes to `<file>.tmp`
/// 2. Sync the temporary file to disk
/// 3. Rename it over the snapshot file
/// 4. Fsync the parent directory so the rename itself is durable
///
/// A crash at any point leaves either the old or the new snapshot on disk.
///
/// # Locking
///
/// Opening a store takes an exclusive advisory lock on `<file>.lock`, held
/// until the store is dropped. A second open of the same file, from this
/// process or another one, fails with [`StorageError::Locked`].
///
/// # Example
///
/// ```no_run
/// use runedb_storage::{FileStore, SnapshotStore};
/// use std::path::Path;
///
/// let mut store = FileStore::open(Path::new("notes.runedb")).unwrap();
/// store.replace(b"{}").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    temp_path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl FileStore {
    /// Opens the store at `path`, taking its lock.
    ///
    /// The snapshot file itself is not created until the first `replace`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if the lock is held elsewhere, or an
    /// I/O error if the lock file cannot be created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let lock_path = sibling(path, LOCK_SUFFIX);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked { path: lock_path });
        }

        Ok(Self {
            path: path.to_path_buf(),
            temp_path: sibling(path, TEMP_SUFFIX),
            _lock_file: lock_file,
        })
    }

    /// Opens the store, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the store cannot
    /// be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Self::open(path)
    }

    /// Returns the path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn sync_parent(&self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            File::open(parent)?.sync_all()?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_parent(&self) -> StorageResult<()> {
        // NTFS journals metadata; there is no directory handle to fsync
        Ok(())
    }
}

impl SnapshotStore for FileStore {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        if data.is_empty() {
            return Ok(None);
        }
        Ok(Some(data))
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let mut file = File::create(&self.temp_path)?;
        if let Err(e) = file.write_all(data).and_then(|()| file.sync_all()) {
            drop(file);
            let _ = fs::remove_file(&self.temp_path);
            return Err(e.into());
        }
        drop(file);

        fs::rename(&self.temp_path, &self.path)?;
        self.sync_parent()?;

        debug!(path = %self.path.display(), bytes = data.len(), "snapshot replaced");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Builds `<path>.<suffix>` next to the snapshot file.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
