//! # RuneDB Storage
//!
//! Snapshot store trait and implementations for RuneDB.
//!
//! A RuneDB database is persisted as a single snapshot: every flush replaces
//! the whole backing object. Stores are **opaque byte holders** - they do not
//! interpret the bytes, know nothing about encryption, and never see a
//! partially written snapshot.
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral databases
//! - [`FileStore`] - One file per database, atomic replace, advisory lock
//!
//! ## Providers
//!
//! The host decides where a named database lives. It hands the engine a
//! [`StoreProvider`], which resolves a name into a store:
//!
//! - [`MemoryProvider`] - Per-name in-memory stores that survive reopen
//! - [`DirectoryProvider`] - `<dir>/<name>.runedb` files
//!
//! ## Example
//!
//! ```rust
//! use runedb_storage::{InMemoryStore, SnapshotStore};
//!
//! let mut store = InMemoryStore::new();
//! assert!(store.load().unwrap().is_none());
//!
//! store.replace(b"snapshot v1").unwrap();
//! assert_eq!(store.load().unwrap().as_deref(), Some(&b"snapshot v1"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod provider;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use provider::{DirectoryProvider, MemoryProvider, StoreProvider, FILE_EXTENSION};
pub use store::SnapshotStore;
