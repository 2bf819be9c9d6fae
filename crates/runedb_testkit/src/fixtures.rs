//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases
//! and common test scenarios.

use runedb_core::crypto::KdfParams;
use runedb_core::{Config, Database, Rune, Value};
use runedb_storage::{DirectoryProvider, FILE_EXTENSION};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Name every fixture database is opened under.
pub const TEST_DB_NAME: &str = "test";

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    /// Entry point for file-backed databases, used to reopen them.
    rune: Option<Rune>,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestDatabase {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self {
            db: Database::open_in_memory().expect("Failed to open in-memory database"),
            rune: None,
            temp_dir: None,
        }
    }

    /// Creates a new file-backed test database in a temporary directory.
    pub fn file() -> Self {
        Self::file_with_config(fast_config())
    }

    /// Creates a file-backed test database with a custom configuration.
    pub fn file_with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let rune = Rune::with_config(DirectoryProvider::new(temp_dir.path()), config);
        let db = rune
            .db(TEST_DB_NAME, None, None)
            .expect("Failed to open file database");

        Self {
            db,
            rune: Some(rune),
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the snapshot file path if file-backed, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir
            .as_ref()
            .map(|d| d.path().join(format!("{TEST_DB_NAME}.{FILE_EXTENSION}")))
    }

    /// Closes the database and opens it again from its file.
    ///
    /// # Panics
    ///
    /// Panics for in-memory databases, which do not survive a close.
    pub fn reopen(&mut self) {
        let rune = self.rune.as_ref().expect("only file databases can be reopened");
        self.db.close().expect("Failed to close database");
        self.db = rune
            .db(TEST_DB_NAME, None, None)
            .expect("Failed to reopen database");
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Configuration with cheap key derivation, for tests that derive keys.
pub fn fast_config() -> Config {
    Config::default().kdf(KdfParams::new(64, 1, 1))
}

/// Builds a record `{"id": id, "title": title}`.
pub fn record(id: impl Into<Value>, title: &str) -> Value {
    Value::map(vec![("id", id.into()), ("title", Value::from(title))])
}

/// Converts a `serde_json::json!` literal into a document value.
pub fn json(value: serde_json::Value) -> Value {
    Value::from(value)
}

/// Runs a test with a temporary in-memory database.
///
/// # Example
///
/// ```rust
/// use runedb_testkit::with_temp_db;
///
/// with_temp_db(|db| {
///     db.push("job").unwrap();
///     assert!(db.pop().unwrap().is_some());
/// });
/// ```
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.db)
}

/// Runs a test with a temporary file-backed database.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database, &Path) -> R,
{
    let test_db = TestDatabase::file();
    let path = test_db.path().expect("File database should have a path");
    f(&test_db.db, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a database whose `notes` collection holds `count` records
    /// with ids `0..count`.
    pub fn populated_database(count: usize) -> TestDatabase {
        let test_db = TestDatabase::memory();
        let notes = test_db.collection("notes").expect("Failed to open collection");

        for i in 0..count {
            let id = i64::try_from(i).expect("count fits in i64");
            notes
                .insert(record(id, &format!("note {i}")))
                .expect("Failed to insert record");
        }

        test_db
    }

    /// Creates a database with `count` collections of one record each and
    /// a `settings` map.
    pub fn multi_store_database(count: usize) -> (TestDatabase, Vec<String>) {
        let test_db = TestDatabase::memory();
        let mut names = Vec::with_capacity(count);

        for i in 0..count {
            let name = format!("collection_{i}");
            test_db
                .collection(&name)
                .and_then(|c| c.insert(Value::map(vec![("index", Value::from(i as i64))])))
                .expect("Failed to insert record");
            names.push(name);
        }

        let settings = test_db.map("settings").expect("Failed to open map");
        settings.set("theme", "dark").expect("Failed to set entry");
        settings.set("lang", "en").expect("Failed to set entry");

        (test_db, names)
    }
}
