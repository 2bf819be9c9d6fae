//! Named key-value maps.

use crate::database::DatabaseInner;
use crate::document::check_item;
use crate::error::CoreResult;
use runedb_codec::{Map, Value};
use std::sync::Arc;

/// Handle to a named flat map from string keys to arbitrary values.
///
/// Handles are cheap to clone and keep their database open. Callbacks passed
/// to [`commit_transform`](Self::commit_transform) run under the writer lock
/// and must not mutate the database.
#[derive(Clone)]
pub struct KeyValueMap {
    db: Arc<DatabaseInner>,
    name: String,
}

impl KeyValueMap {
    pub(crate) fn new(db: Arc<DatabaseInner>, name: &str) -> Self {
        Self {
            db,
            name: name.to_string(),
        }
    }

    /// Name of the map.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts or replaces `key`.
    ///
    /// Setting a key to the value it already holds is not a mutation.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> CoreResult<()> {
        let key = key.into();
        let value = value.into();
        check_item(&value, 0)?;

        self.db.commit(|state| {
            if state.doc.entries(&self.name)?.get(&key) == Some(&value) {
                return Ok(((), false));
            }
            state.doc.entries_mut(&self.name)?.insert(key, value);
            state.refs.revalidate_store(&state.doc, &self.name);
            Ok(((), true))
        })
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> CoreResult<Option<Value>> {
        Ok(self.db.snapshot()?.doc.entries(&self.name)?.get(key).cloned())
    }

    /// Deletes `key`. Returns whether it was present.
    pub fn remove(&self, key: &str) -> CoreResult<bool> {
        self.db.commit(|state| {
            if !state.doc.entries(&self.name)?.contains_key(key) {
                return Ok((false, false));
            }
            state.doc.entries_mut(&self.name)?.remove(key);
            state.refs.revalidate_store(&state.doc, &self.name);
            Ok((true, true))
        })
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> CoreResult<bool> {
        Ok(self.db.snapshot()?.doc.entries(&self.name)?.contains_key(key))
    }

    /// Copy of every entry.
    pub fn list(&self) -> CoreResult<Map> {
        Ok(self.db.snapshot()?.doc.entries(&self.name)?.clone())
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> CoreResult<Vec<String>> {
        Ok(self.db.snapshot()?.doc.entries(&self.name)?.keys().cloned().collect())
    }

    /// Number of entries.
    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.db.snapshot()?.doc.entries(&self.name)?.len())
    }

    /// Returns true if the map has no entries.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Passes a copy of the whole map to `f` and returns its result.
    pub fn transform(&self, f: impl FnOnce(Map) -> Map) -> CoreResult<Map> {
        Ok(f(self.list()?))
    }

    /// Like [`transform`](Self::transform), then stores the result.
    pub fn commit_transform(&self, f: impl FnOnce(Map) -> Map) -> CoreResult<Map> {
        self.db.mutate(|state| {
            let next = f(state.doc.entries(&self.name)?.clone());
            next.values().try_for_each(|value| check_item(value, 0))?;

            state.doc.entries_mut(&self.name)?.clone_from(&next);
            state.refs.revalidate_store(&state.doc, &self.name);
            Ok(next)
        })
    }
}

impl std::fmt::Debug for KeyValueMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueMap")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::{CoreError, Database, Value};

    #[test]
    fn set_get_remove() {
        let db = Database::open_in_memory().unwrap();
        let settings = db.map("settings").unwrap();

        settings.set("theme", "dark").unwrap();
        assert_eq!(settings.get("theme").unwrap(), Some(Value::from("dark")));
        assert!(settings.contains_key("theme").unwrap());

        assert!(settings.remove("theme").unwrap());
        assert_eq!(settings.get("theme").unwrap(), None);
        assert!(!settings.remove("theme").unwrap());
        assert!(settings.is_empty().unwrap());
    }

    #[test]
    fn unchanged_set_does_not_flush() {
        let db = Database::open_in_memory().unwrap();
        let settings = db.map("settings").unwrap();

        settings.set("theme", "dark").unwrap();
        let version = db.version();
        settings.set("theme", "dark").unwrap();
        assert_eq!(db.version(), version);

        settings.set("theme", "light").unwrap();
        assert_eq!(db.version(), version + 1);
    }

    #[test]
    fn keys_and_list() {
        let db = Database::open_in_memory().unwrap();
        let prefs = db.map("prefs").unwrap();
        prefs.set("b", 2).unwrap();
        prefs.set("a", 1).unwrap();

        assert_eq!(prefs.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(prefs.len().unwrap(), 2);
        assert_eq!(prefs.list().unwrap().get("b"), Some(&Value::from(2)));
        assert_eq!(prefs.name(), "prefs");
    }

    #[test]
    fn transform_variants() {
        let db = Database::open_in_memory().unwrap();
        let counters = db.map("counters").unwrap();
        counters.set("hits", 1).unwrap();

        let doubled = |mut map: runedb_codec::Map| {
            for value in map.values_mut() {
                if let Some(n) = value.as_integer() {
                    *value = Value::from(n * 2);
                }
            }
            map
        };

        let preview = counters.transform(doubled).unwrap();
        assert_eq!(preview.get("hits"), Some(&Value::from(2)));
        assert_eq!(counters.get("hits").unwrap(), Some(Value::from(1)));

        counters.commit_transform(doubled).unwrap();
        assert_eq!(counters.get("hits").unwrap(), Some(Value::from(2)));
    }

    #[test]
    fn non_finite_values_rejected() {
        let db = Database::open_in_memory().unwrap();
        let stats = db.map("stats").unwrap();
        assert!(matches!(
            stats.set("ratio", f64::NAN),
            Err(CoreError::Codec(_))
        ));
        assert!(stats.is_empty().unwrap());
    }

    #[test]
    fn overwriting_entry_invalidates_reference() {
        let db = Database::open_in_memory().unwrap();
        let settings = db.map("settings").unwrap();
        settings.set("theme", "dark").unwrap();

        let ref_id = db.make_ref(&Value::from("dark"), None).unwrap().unwrap();
        assert_eq!(db.find_ref(&ref_id).unwrap(), Some(Value::from("dark")));

        settings.set("theme", "light").unwrap();
        assert_eq!(db.find_ref(&ref_id).unwrap(), None);
    }
}
