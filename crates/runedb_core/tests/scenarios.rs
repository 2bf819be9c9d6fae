//! End-to-end scenarios over in-memory databases.

use proptest::prelude::*;
use runedb_core::{CoreError, Database, Selector, Value, ID_FIELD};
use runedb_testkit::prelude::*;
use std::cmp::Ordering;

#[test]
fn notes_items_list_in_insertion_order() {
    with_temp_db(|db| {
        let items = db.collection("items").unwrap();
        items.insert(json(serde_json::json!({"id": "b", "text": "second"}))).unwrap();
        items.insert(json(serde_json::json!({"id": "a", "text": "first"}))).unwrap();

        let ids: Vec<Value> = items
            .list()
            .unwrap()
            .iter()
            .filter_map(|r| r.get(ID_FIELD).cloned())
            .collect();
        assert_eq!(ids, vec![Value::from("b"), Value::from("a")]);
    });
}

#[test]
fn settings_set_get_remove() {
    with_temp_db(|db| {
        let settings = db.map("settings").unwrap();
        settings.set("theme", "dark").unwrap();
        assert_eq!(settings.get("theme").unwrap(), Some(Value::from("dark")));

        assert!(settings.remove("theme").unwrap());
        assert_eq!(settings.get("theme").unwrap(), None);
    });
}

#[test]
fn duplicate_id_leaves_contents_unchanged() {
    let test_db = scenarios::populated_database(3);
    let notes = test_db.collection("notes").unwrap();
    let before = test_db.get_data().unwrap();

    assert!(matches!(
        notes.insert(record(1, "again")),
        Err(CoreError::DuplicateId { .. })
    ));
    assert_eq!(test_db.get_data().unwrap(), before);
}

#[test]
fn generated_ids_are_unique_text() {
    with_temp_db(|db| {
        let items = db.collection("items").unwrap();
        let a = items.insert(Value::empty_map()).unwrap();
        let b = items.insert(Value::empty_map()).unwrap();

        let (a, b) = (a.get(ID_FIELD).unwrap(), b.get(ID_FIELD).unwrap());
        assert!(a.as_text().is_some());
        assert_ne!(a, b);
    });
}

#[test]
fn criteria_update_touches_only_matches() {
    with_temp_db(|db| {
        let tasks = db.collection("tasks").unwrap();
        tasks.insert(json(serde_json::json!({"id": 1, "done": false, "tag": "a"}))).unwrap();
        tasks.insert(json(serde_json::json!({"id": 2, "done": false, "tag": "b"}))).unwrap();

        let updated = tasks
            .update(Selector::criteria([("tag", "a")]), json(serde_json::json!({"done": true})))
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(
            tasks.read(2, false).unwrap().and_then(|r| r.get("done").cloned()),
            Some(Value::Bool(false))
        );
        assert!(matches!(
            tasks.update(Selector::criteria([("tag", "z")]), Value::empty_map()),
            Err(CoreError::NotFound { .. })
        ));
    });
}

#[test]
fn reference_follows_record_lifecycle() {
    with_temp_db(references::check_reference_lifecycle);
}

#[test]
fn evaluated_read_inlines_references() {
    with_temp_db(|db| {
        let authors = db.collection("authors").unwrap();
        let author = authors
            .insert(json(serde_json::json!({"id": "ada", "name": "Ada"})))
            .unwrap();
        let ref_id = db.make_ref(&author, None).unwrap().unwrap();

        let books = db.collection("books").unwrap();
        books
            .insert(Value::map(vec![
                (ID_FIELD, Value::from(1)),
                ("author", runedb_core::ref_marker(&ref_id)),
            ]))
            .unwrap();

        let raw = books.read(1, false).unwrap().unwrap();
        assert_eq!(raw.get("author"), Some(&runedb_core::ref_marker(&ref_id)));

        let evaluated = books.read(1, true).unwrap().unwrap();
        assert_eq!(evaluated.get("author"), Some(&author));
    });
}

#[test]
fn concurrent_inserts_yield_every_record() {
    let db = Database::open_in_memory().unwrap();
    let config = StressConfig {
        operations: 800,
        threads: 8,
        ..Default::default()
    };

    let result = stress_concurrent_inserts(&db, &config);
    assert_eq!(result.failed_ops, 0);

    let records = db.collection(&config.collection).unwrap().list().unwrap();
    assert_eq!(records.len(), 800);
    assert!(records.iter().all(|r| r.get(ID_FIELD).is_some() && r.get("body").is_some()));
}

#[test]
fn failed_commit_is_atomic() {
    with_temp_db(isolation::check_failed_write_is_atomic);
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn sort_leaves_collection_and_commit_sort_is_stable(
        records in prop::collection::vec(ranked_record_strategy(4), 0..24)
    ) {
        let db = Database::open_in_memory().unwrap();
        let ranked = db.collection("ranked").unwrap();
        for r in &records {
            ranked.insert(r.clone()).unwrap();
        }
        let original = ranked.list().unwrap();

        let by_rank = |a: &Value, b: &Value| -> Ordering {
            a.get("rank").and_then(Value::as_integer)
                .cmp(&b.get("rank").and_then(Value::as_integer))
        };

        let preview = ranked.sort(by_rank).unwrap();
        prop_assert_eq!(ranked.list().unwrap(), original.clone());

        let mut expected = original;
        expected.sort_by(by_rank);
        prop_assert_eq!(&preview, &expected);
        prop_assert_eq!(ranked.commit_sort(by_rank).unwrap(), expected.clone());
        prop_assert_eq!(ranked.list().unwrap(), expected);
    }

    #[test]
    fn insert_read_round_trip(record in record_strategy()) {
        let db = Database::open_in_memory().unwrap();
        let items = db.collection("items").unwrap();
        let stored = items.insert(record.clone()).unwrap();
        prop_assert_eq!(&stored, &record);

        let id = record.get(ID_FIELD).cloned().unwrap();
        prop_assert_eq!(items.read(id, false).unwrap(), Some(record));
    }

    #[test]
    fn ref_ids_are_deterministic(value in value_strategy()) {
        let db = Database::open_in_memory().unwrap();
        db.map("values").unwrap().set("v", value.clone()).unwrap();

        let first = db.make_ref(&value, None).unwrap();
        let second = db.make_ref(&value, None).unwrap();
        prop_assert!(first.is_some());
        prop_assert_eq!(first, second);
    }
}
