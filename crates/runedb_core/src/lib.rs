//! # RuneDB Core
//!
//! Embedded document database engine for RuneDB.
//!
//! A database is a single root document (a map) holding named collections of
//! records and named key-value maps. The whole document is persisted as one
//! snapshot through a [`SnapshotStore`](runedb_storage::SnapshotStore):
//! pretty JSON in the clear, or an AES-256-GCM envelope when opened with a
//! key.
//!
//! This crate provides:
//! - [`Rune`]: opens databases by name through an injected store provider
//! - [`Database`]: root document access, references, flush and lifecycle
//! - [`Collection`] and [`KeyValueMap`]: handles over the root document
//! - [`Codec`]: snapshot serialization and sealing
//! - [`crypto`]: keys, Argon2id key derivation and AES-GCM
//!
//! ## Example
//!
//! ```rust
//! use runedb_core::{Rune, Selector, Value};
//! use runedb_storage::MemoryProvider;
//!
//! let rune = Rune::new(MemoryProvider::new());
//! let db = rune.db("notes", None, None)?;
//!
//! let items = db.collection("items")?;
//! items.insert(Value::map(vec![("id", Value::from("a")), ("text", Value::from("milk"))]))?;
//! let found = items.read(Selector::criteria([("text", "milk")]), false)?;
//! assert!(found.is_some());
//!
//! let settings = db.map("settings")?;
//! settings.set("theme", "dark")?;
//! assert_eq!(settings.get("theme")?, Some(Value::from("dark")));
//! # Ok::<(), runedb_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
pub mod crypto;
mod database;
mod document;
mod error;
mod flush;
mod kv;
mod reference;
mod rune;
mod selector;
mod snapshot;

pub use collection::Collection;
pub use config::Config;
pub use database::{Database, OpenOptions};
pub use document::{MAX_ITEM_DEPTH, MAX_ROOT_DEPTH, STACK_KEY};
pub use error::{CoreError, CoreResult};
pub use kv::KeyValueMap;
pub use reference::{parse_props, ref_marker, Location, REF_FIELD};
pub use rune::Rune;
pub use selector::{Selector, ID_FIELD};
pub use snapshot::{Codec, Snapshot, FORMAT_VERSION, MAGIC};

pub use runedb_codec::{Map, Value};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
