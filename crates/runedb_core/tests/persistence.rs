//! Reopen and encryption behavior against real snapshot files.

use runedb_core::crypto::EncryptionKey;
use runedb_core::{CoreError, Database, OpenOptions, Rune, Value, MAGIC};
use runedb_storage::{DirectoryProvider, FileStore};
use runedb_testkit::prelude::*;
use std::time::Duration;
use tempfile::tempdir;

fn populate(db: &Database) {
    db.collection("notes").unwrap().insert(record(1, "first")).unwrap();
    db.map("settings").unwrap().set("theme", "dark").unwrap();
    db.push("pending").unwrap();
}

#[test]
fn reopen_with_same_key_restores_data() {
    let dir = tempdir().unwrap();
    let rune = Rune::with_config(DirectoryProvider::new(dir.path()), fast_config());
    let key = rune.gen_key("open sesame").unwrap();

    let db = rune.db("vault", None, Some(&key)).unwrap();
    populate(&db);
    let before = db.get_data().unwrap();
    db.close().unwrap();

    let bytes = std::fs::read(dir.path().join("vault.runedb")).unwrap();
    assert!(bytes.starts_with(MAGIC));
    assert!(!String::from_utf8_lossy(&bytes).contains("dark"));

    let db = rune.db("vault", None, Some(&key)).unwrap();
    assert_eq!(db.get_data().unwrap(), before);
}

#[test]
fn wrong_key_fails_to_open() {
    let dir = tempdir().unwrap();
    let rune = Rune::with_config(DirectoryProvider::new(dir.path()), fast_config());
    let key = rune.gen_key("open sesame").unwrap();
    let wrong = rune.gen_key("close sesame").unwrap();

    let db = rune.db("vault", None, Some(&key)).unwrap();
    populate(&db);
    db.close().unwrap();

    assert!(matches!(
        rune.db("vault", None, Some(&wrong)),
        Err(CoreError::DecryptionFailed { .. })
    ));
    // The failed attempt must not have damaged or locked the file.
    assert!(rune.db("vault", None, Some(&key)).is_ok());
}

#[test]
fn plaintext_file_is_readable_json() {
    with_file_db(|db, path| {
        populate(db);
        let text = std::fs::read_to_string(path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["data"]["settings"]["theme"], "dark");
        assert_eq!(json["format"], 1);
    });
}

#[test]
fn references_survive_reopen() {
    let mut test_db = TestDatabase::file();
    let notes = test_db.collection("notes").unwrap();
    let note = notes.insert(record("n1", "hello")).unwrap();
    let ref_id = test_db.make_ref(&note, Some("title")).unwrap().unwrap();
    drop(notes);

    test_db.reopen();
    assert_eq!(test_db.find_ref(&ref_id).unwrap(), Some(note));
    assert_eq!(test_db.ref_count().unwrap(), 1);
}

#[test]
fn rekey_to_plaintext_and_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notes.runedb");
    let key = EncryptionKey::generate();

    let db = Database::open_with_store(
        "notes",
        Box::new(FileStore::open(&path).unwrap()),
        fast_config(),
        OpenOptions::new().key(key.clone()),
    )
    .unwrap();
    populate(&db);
    assert!(std::fs::read(&path).unwrap().starts_with(MAGIC));

    db.rekey(None).unwrap();
    assert!(!db.is_encrypted());
    assert!(std::fs::read_to_string(&path).unwrap().contains("dark"));

    db.rekey(Some(key)).unwrap();
    assert!(std::fs::read(&path).unwrap().starts_with(MAGIC));
}

#[test]
fn interval_flush_writes_in_background() {
    let dir = tempdir().unwrap();
    let config = fast_config().flush_interval(Duration::from_millis(20));
    let rune = Rune::with_config(DirectoryProvider::new(dir.path()), config);
    let path = dir.path().join("notes.runedb");

    let db = rune.db("notes", None, None).unwrap();
    db.map("settings").unwrap().set("theme", "dark").unwrap();
    assert!(db.is_dirty());

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while db.is_dirty() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(!db.is_dirty());
    assert!(std::fs::read_to_string(&path).unwrap().contains("dark"));
    db.close().unwrap();
}

#[test]
fn dropping_last_handle_flushes() {
    let dir = tempdir().unwrap();
    let config = fast_config().flush_interval(Duration::from_secs(3600));
    let rune = Rune::with_config(DirectoryProvider::new(dir.path()), config);

    {
        let db = rune.db("notes", None, None).unwrap();
        db.push(Value::from(42)).unwrap();
    }

    let db = rune.db("notes", None, None).unwrap();
    assert_eq!(db.pop().unwrap(), Some(Value::from(42)));
}
