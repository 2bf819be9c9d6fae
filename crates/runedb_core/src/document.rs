//! The root document, shared copy-on-write between snapshots.

use crate::error::{CoreError, CoreResult};
use crate::selector::ID_FIELD;
use runedb_codec::{CodecError, Map, Value, MAX_DEPTH};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Root key backing `push` and `pop`.
pub const STACK_KEY: &str = "_stack";

/// Kind name of array-valued root entries.
pub(crate) const COLLECTION_KIND: &str = "collection";
/// Kind name of map-valued root entries.
pub(crate) const MAP_KIND: &str = "map";

/// Containers a snapshot wraps around a stored item: the snapshot map, the
/// root map and the store itself.
const SNAPSHOT_NESTING: usize = 3;

/// Deepest record, entry or stack item that still reads back from a snapshot.
pub const MAX_ITEM_DEPTH: usize = MAX_DEPTH - SNAPSHOT_NESTING;

/// Deepest root document that still reads back from a snapshot.
pub const MAX_ROOT_DEPTH: usize = MAX_DEPTH - 1;

/// Checks that `value` can be stored as a record, entry or stack item.
///
/// `nesting` is the number of containers already between the item and the
/// store, 1 for a field of a record.
pub(crate) fn check_item(value: &Value, nesting: usize) -> CoreResult<()> {
    value
        .validate_nested(MAX_ITEM_DEPTH - nesting)
        .map_err(|e| match e {
            CodecError::DepthLimitExceeded { .. } => CoreError::invalid_record(format!(
                "value nests deeper than {MAX_ITEM_DEPTH} levels"
            )),
            other => CoreError::Codec(other),
        })
}

static EMPTY_MAP: Map = Map::new();

/// Kind of store held at a root key, as reported in errors.
pub(crate) fn store_kind(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => COLLECTION_KIND,
        Value::Map(_) => MAP_KIND,
        other => other.kind(),
    }
}

/// The root map of a database.
///
/// Each root entry sits behind its own `Arc`, so cloning a document is cheap
/// and a mutation only copies the entries it touches.
#[derive(Debug, Clone, Default)]
pub(crate) struct Document {
    entries: BTreeMap<String, Arc<Value>>,
}

impl Document {
    pub fn from_map(map: Map) -> Self {
        Self {
            entries: map.into_iter().map(|(k, v)| (k, Arc::new(v))).collect(),
        }
    }

    /// Deep copy of the whole tree.
    pub fn to_map(&self) -> Map {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::clone(v)))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).map(Arc::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn names_of_kind(&self, kind: &str) -> Vec<String> {
        self.iter()
            .filter(|(name, value)| *name != STACK_KEY && store_kind(value) == kind)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Records of collection `name`; empty if the collection does not exist.
    pub fn sequence(&self, name: &str) -> CoreResult<&[Value]> {
        match self.get(name) {
            None => Ok(&[]),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(CoreError::kind_mismatch(name, COLLECTION_KIND, store_kind(other))),
        }
    }

    /// Mutable records of collection `name`, creating it if needed.
    pub fn sequence_mut(&mut self, name: &str) -> CoreResult<&mut Vec<Value>> {
        let slot = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Value::Array(Vec::new())));
        match Arc::make_mut(slot) {
            Value::Array(items) => Ok(items),
            other => Err(CoreError::kind_mismatch(name, COLLECTION_KIND, store_kind(other))),
        }
    }

    /// Entries of map `name`; empty if the map does not exist.
    pub fn entries(&self, name: &str) -> CoreResult<&Map> {
        match self.get(name) {
            None => Ok(&EMPTY_MAP),
            Some(Value::Map(entries)) => Ok(entries),
            Some(other) => Err(CoreError::kind_mismatch(name, MAP_KIND, store_kind(other))),
        }
    }

    /// Mutable entries of map `name`, creating it if needed.
    pub fn entries_mut(&mut self, name: &str) -> CoreResult<&mut Map> {
        let slot = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Value::empty_map()));
        match Arc::make_mut(slot) {
            Value::Map(entries) => Ok(entries),
            other => Err(CoreError::kind_mismatch(name, MAP_KIND, store_kind(other))),
        }
    }

    /// Fails if `name` exists with a kind other than `kind`.
    pub fn check_kind(&self, name: &str, kind: &'static str) -> CoreResult<()> {
        match self.get(name) {
            Some(value) if store_kind(value) != kind => {
                Err(CoreError::kind_mismatch(name, kind, store_kind(value)))
            }
            _ => Ok(()),
        }
    }

    /// Finds the record of `collection` whose id equals `id`.
    pub fn record(&self, collection: &str, id: &Value) -> Option<&Value> {
        match self.get(collection)? {
            Value::Array(items) => items.iter().find(|r| r.get(ID_FIELD) == Some(id)),
            _ => None,
        }
    }

    /// Finds entry `key` of map `map`.
    pub fn entry(&self, map: &str, key: &str) -> Option<&Value> {
        match self.get(map)? {
            Value::Map(entries) => entries.get(key),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let mut root = Map::new();
        root.insert(
            "notes".into(),
            Value::Array(vec![Value::map(vec![("id", Value::from("a"))])]),
        );
        root.insert("settings".into(), Value::map(vec![("theme", Value::from("dark"))]));
        root.insert("count".into(), Value::from(3));
        Document::from_map(root)
    }

    #[test]
    fn kinds_are_checked() {
        let doc = sample();
        assert_eq!(doc.sequence("notes").unwrap().len(), 1);
        assert!(doc.sequence("missing").unwrap().is_empty());
        assert!(doc.entries("missing").unwrap().is_empty());

        assert!(matches!(
            doc.sequence("settings"),
            Err(CoreError::KindMismatch { expected: "collection", actual: "map", .. })
        ));
        assert!(matches!(
            doc.entries("notes"),
            Err(CoreError::KindMismatch { expected: "map", actual: "collection", .. })
        ));
        assert!(doc.check_kind("count", MAP_KIND).is_err());
        assert!(doc.check_kind("notes", COLLECTION_KIND).is_ok());
    }

    #[test]
    fn mutation_does_not_leak_into_clones() {
        let before = sample();
        let mut after = before.clone();

        after.sequence_mut("notes").unwrap().clear();
        after.entries_mut("settings").unwrap().insert("lang".into(), Value::from("en"));

        assert_eq!(before.sequence("notes").unwrap().len(), 1);
        assert_eq!(before.entries("settings").unwrap().len(), 1);
        assert!(after.sequence("notes").unwrap().is_empty());
        assert_eq!(after.entries("settings").unwrap().len(), 2);
    }

    #[test]
    fn mutable_access_creates_store() {
        let mut doc = Document::default();
        doc.sequence_mut("items").unwrap();
        doc.entries_mut("prefs").unwrap();

        assert_eq!(doc.names_of_kind(COLLECTION_KIND), vec!["items".to_string()]);
        assert_eq!(doc.names_of_kind(MAP_KIND), vec!["prefs".to_string()]);
        assert!(doc.entries_mut("items").is_err());
    }

    #[test]
    fn stack_is_not_a_collection_name() {
        let mut doc = Document::default();
        doc.sequence_mut(STACK_KEY).unwrap().push(Value::from(1));
        assert!(doc.names_of_kind(COLLECTION_KIND).is_empty());
    }

    #[test]
    fn lookups_by_location() {
        let doc = sample();
        assert!(doc.record("notes", &Value::from("a")).is_some());
        assert!(doc.record("notes", &Value::from("b")).is_none());
        assert!(doc.record("settings", &Value::from("a")).is_none());
        assert_eq!(doc.entry("settings", "theme"), Some(&Value::from("dark")));
        assert_eq!(doc.to_map().len(), 3);
    }
}
