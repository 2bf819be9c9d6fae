//! Cross-crate integration test helpers.
//!
//! Provides a model-checking harness and reusable checks that exercise the
//! engine together with the codec and storage crates.

use runedb_core::{Database, Value, ID_FIELD};
use std::collections::BTreeMap;

/// A test harness that mirrors every write in a plain model and verifies
/// the database agrees with it.
pub struct IntegrationHarness {
    /// The database instance.
    pub db: Database,
    /// Collection under test.
    collection: String,
    /// Expected records by integer id.
    records: BTreeMap<i64, Value>,
}

impl IntegrationHarness {
    /// Creates a new integration harness with an in-memory database.
    pub fn new() -> Self {
        Self::with_database(
            Database::open_in_memory().expect("Failed to open database"),
            "harness",
        )
    }

    /// Creates a harness over an existing database and collection.
    pub fn with_database(db: Database, collection: &str) -> Self {
        Self {
            db,
            collection: collection.to_string(),
            records: BTreeMap::new(),
        }
    }

    /// Inserts a record and tracks it. Returns false if the id already
    /// existed, in which case the insert must have been rejected.
    pub fn insert(&mut self, id: i64, body: Value) -> bool {
        let record = Value::map(vec![(ID_FIELD, Value::from(id)), ("body", body)]);
        let result = self
            .db
            .collection(&self.collection)
            .and_then(|c| c.insert(record.clone()));

        if self.records.contains_key(&id) {
            assert!(result.is_err(), "duplicate id {id} was accepted");
            false
        } else {
            assert_eq!(result.expect("Failed to insert record"), record);
            self.records.insert(id, record);
            true
        }
    }

    /// Removes a record and updates tracking.
    pub fn remove(&mut self, id: i64) {
        let removed = self
            .db
            .collection(&self.collection)
            .and_then(|c| c.remove(id))
            .expect("Failed to remove record");
        assert_eq!(removed, self.records.remove(&id).is_some());
    }

    /// Reads a record and verifies it matches the tracked value.
    pub fn read_and_verify(&self, id: i64) -> Option<Value> {
        let actual = self
            .db
            .collection(&self.collection)
            .and_then(|c| c.read(id, false))
            .expect("Failed to read record");
        assert_eq!(actual.as_ref(), self.records.get(&id), "mismatch for {id}");
        actual
    }

    /// Verifies all tracked records are in the database.
    pub fn verify_all(&self) {
        let collection = self
            .db
            .collection(&self.collection)
            .expect("Failed to open collection");
        assert_eq!(collection.len().expect("Failed to count"), self.records.len());
        for id in self.records.keys() {
            self.read_and_verify(*id);
        }
    }

    /// Returns the count of tracked records.
    pub fn tracked_count(&self) -> usize {
        self.records.len()
    }
}

impl Default for IntegrationHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Codec and storage integration checks.
pub mod codec_storage {
    use super::*;
    use runedb_codec::{from_cbor, to_canonical_cbor};

    /// Stores `value` under a map key, reads it back, and checks that the
    /// canonical encodings agree.
    pub fn check_store_retrieve(db: &Database, value: Value) {
        let map = db.map("codec_storage").expect("Failed to open map");
        map.set("value", value.clone()).expect("Failed to set");

        let retrieved = map.get("value").expect("Failed to get");
        assert_eq!(retrieved.as_ref(), Some(&value));

        let encoded = to_canonical_cbor(&value).expect("Failed to encode");
        let decoded = from_cbor(&encoded).expect("Failed to decode");
        assert_eq!(
            to_canonical_cbor(&decoded).expect("Failed to re-encode"),
            encoded
        );
    }
}

/// Snapshot isolation checks.
pub mod isolation {
    use super::*;

    /// A value read before a write is not changed by the write.
    pub fn check_read_isolation(db: &Database) {
        let notes = db.collection("isolation").expect("Failed to open collection");
        notes
            .insert(Value::map(vec![(ID_FIELD, Value::from(1)), ("v", Value::from(1))]))
            .expect("Failed to insert");

        let before = notes.list().expect("Failed to list");
        notes
            .update(1, Value::map(vec![("v", Value::from(2))]))
            .expect("Failed to update");

        assert_eq!(before[0].get("v"), Some(&Value::from(1)));
        let after = notes.read(1, false).expect("Failed to read");
        assert_eq!(after.and_then(|r| r.get("v").cloned()), Some(Value::from(2)));
    }

    /// A failed operation leaves the database unchanged.
    pub fn check_failed_write_is_atomic(db: &Database) {
        let notes = db.collection("atomic").expect("Failed to open collection");
        notes
            .insert(Value::map(vec![(ID_FIELD, Value::from(1))]))
            .expect("Failed to insert");
        let before = db.get_data().expect("Failed to read root");
        let version = db.version();

        let result = notes.commit_map(|_| Value::map(vec![(ID_FIELD, Value::Bool(true))]));
        assert!(result.is_err());
        assert_eq!(db.get_data().expect("Failed to read root"), before);
        assert_eq!(db.version(), version);
    }
}

/// Reference integration checks.
pub mod references {
    use super::*;

    /// A reference to a record resolves while the record exists and stops
    /// resolving once it is removed.
    pub fn check_reference_lifecycle(db: &Database) {
        let items = db.collection("ref_items").expect("Failed to open collection");
        let record = items
            .insert(Value::map(vec![("name", Value::from("widget"))]))
            .expect("Failed to insert");

        let ref_id = db
            .make_ref(&record, Some("name"))
            .expect("Failed to make reference")
            .expect("record should be located");
        assert_eq!(
            db.find_ref(&ref_id).expect("Failed to find"),
            Some(record.clone())
        );

        let id = record.get(ID_FIELD).cloned().expect("record has an id");
        assert!(items.remove(id).expect("Failed to remove"));
        assert_eq!(db.find_ref(&ref_id).expect("Failed to find"), None);
    }
}
