//! Ordered record collections.

use crate::database::DatabaseInner;
use crate::document::check_item;
use crate::error::{CoreError, CoreResult};
use crate::selector::{Selector, ID_FIELD};
use runedb_codec::{to_canonical_cbor, Map, Value};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Handle to a named collection: an ordered sequence of map records, each
/// carrying a unique `id`.
///
/// Handles are cheap to clone and keep their database open. Pure operations
/// (`map`, `transform`, `filter`, `sort`) return a new sequence and leave the
/// collection untouched; their `commit_*` counterparts also store the result.
///
/// Callbacks passed to `commit_*` run while the database's writer lock is
/// held: they may read the database but must not mutate it.
#[derive(Clone)]
pub struct Collection {
    db: Arc<DatabaseInner>,
    name: String,
}

impl Collection {
    pub(crate) fn new(db: Arc<DatabaseInner>, name: &str) -> Self {
        Self {
            db,
            name: name.to_string(),
        }
    }

    /// Name of the collection.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a record, assigning a UUID `id` if it has none.
    ///
    /// Returns the stored record.
    ///
    /// # Errors
    ///
    /// - `InvalidRecord` if the record is not a map or its id is not text or
    ///   an integer
    /// - `DuplicateId` if a record with the same id exists; nothing changes
    pub fn insert(&self, record: impl Into<Value>) -> CoreResult<Value> {
        let mut record = record.into();
        let id = prepare_record(&mut record)?;

        self.db.mutate(|state| {
            let records = state.doc.sequence_mut(&self.name)?;
            if records.iter().any(|r| r.get(ID_FIELD) == Some(&id)) {
                return Err(CoreError::duplicate_id(&self.name, id.to_string()));
            }
            records.push(record.clone());
            Ok(record)
        })
    }

    /// First record selected by `selector`.
    ///
    /// With `evaluate`, reference markers (`{"$ref": id}`) anywhere in the
    /// record are replaced by the referenced values.
    pub fn read(&self, selector: impl Into<Selector>, evaluate: bool) -> CoreResult<Option<Value>> {
        let selector = selector.into();
        let state = self.db.snapshot()?;
        let found = state
            .doc
            .sequence(&self.name)?
            .iter()
            .find(|record| selector.matches(record));

        Ok(found.map(|record| {
            if evaluate {
                state.refs.evaluate(&state.doc, record)
            } else {
                record.clone()
            }
        }))
    }

    /// Shallow-merges `patch` into every selected record; `id` is never
    /// changed. Returns the updated records.
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing is selected; `InvalidRecord` if `patch` is not a
    /// map.
    pub fn update(
        &self,
        selector: impl Into<Selector>,
        patch: impl Into<Value>,
    ) -> CoreResult<Vec<Value>> {
        let selector = selector.into();
        let Value::Map(patch) = patch.into() else {
            return Err(CoreError::invalid_record("update patch must be a map"));
        };
        patch.values().try_for_each(|value| check_item(value, 1))?;

        self.db.mutate(|state| {
            let records = state.doc.sequence_mut(&self.name)?;
            let mut updated = Vec::new();
            for record in records.iter_mut().filter(|r| selector.matches(r)) {
                if let Some(fields) = record.as_map_mut() {
                    merge(fields, &patch);
                }
                updated.push(record.clone());
            }
            if updated.is_empty() {
                return Err(CoreError::not_found(&self.name, selector.to_string()));
            }
            state.refs.revalidate_store(&state.doc, &self.name);
            Ok(updated)
        })
    }

    /// Deletes every selected record. Returns whether any was removed.
    pub fn remove(&self, selector: impl Into<Selector>) -> CoreResult<bool> {
        let selector = selector.into();
        self.db.commit(|state| {
            if !state.doc.sequence(&self.name)?.iter().any(|r| selector.matches(r)) {
                return Ok((false, false));
            }
            state
                .doc
                .sequence_mut(&self.name)?
                .retain(|record| !selector.matches(record));
            state.refs.revalidate_store(&state.doc, &self.name);
            Ok((true, true))
        })
    }

    /// Every selected record, in collection order.
    pub fn find(&self, selector: impl Into<Selector>) -> CoreResult<Vec<Value>> {
        let selector = selector.into();
        let state = self.db.snapshot()?;
        Ok(state
            .doc
            .sequence(&self.name)?
            .iter()
            .filter(|record| selector.matches(record))
            .cloned()
            .collect())
    }

    /// Copy of every record, in collection order.
    pub fn list(&self) -> CoreResult<Vec<Value>> {
        Ok(self.db.snapshot()?.doc.sequence(&self.name)?.to_vec())
    }

    /// Number of records.
    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.db.snapshot()?.doc.sequence(&self.name)?.len())
    }

    /// Returns true if the collection holds no records.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Applies `f` to every record and returns the results.
    pub fn map(&self, f: impl FnMut(&Value) -> Value) -> CoreResult<Vec<Value>> {
        Ok(self.list()?.iter().map(f).collect())
    }

    /// Like [`map`](Self::map), then stores the results.
    pub fn commit_map(&self, f: impl FnMut(&Value) -> Value) -> CoreResult<Vec<Value>> {
        self.replace_with(|records| records.iter().map(f).collect())
    }

    /// Passes the whole sequence to `f` and returns its result.
    pub fn transform(&self, f: impl FnOnce(Vec<Value>) -> Vec<Value>) -> CoreResult<Vec<Value>> {
        Ok(f(self.list()?))
    }

    /// Like [`transform`](Self::transform), then stores the result.
    pub fn commit_transform(
        &self,
        f: impl FnOnce(Vec<Value>) -> Vec<Value>,
    ) -> CoreResult<Vec<Value>> {
        self.replace_with(f)
    }

    /// Records for which `predicate` holds.
    pub fn filter(&self, mut predicate: impl FnMut(&Value) -> bool) -> CoreResult<Vec<Value>> {
        let mut records = self.list()?;
        records.retain(|record| predicate(record));
        Ok(records)
    }

    /// Like [`filter`](Self::filter), then stores the result.
    pub fn commit_filter(&self, mut predicate: impl FnMut(&Value) -> bool) -> CoreResult<Vec<Value>> {
        self.replace_with(|mut records| {
            records.retain(|record| predicate(record));
            records
        })
    }

    /// Records in the order given by `compare`. The sort is stable.
    pub fn sort(&self, compare: impl FnMut(&Value, &Value) -> Ordering) -> CoreResult<Vec<Value>> {
        let mut records = self.list()?;
        records.sort_by(compare);
        Ok(records)
    }

    /// Like [`sort`](Self::sort), then stores the result.
    pub fn commit_sort(
        &self,
        compare: impl FnMut(&Value, &Value) -> Ordering,
    ) -> CoreResult<Vec<Value>> {
        self.replace_with(|mut records| {
            records.sort_by(compare);
            records
        })
    }

    /// Replaces the sequence with `derive(current)`.
    ///
    /// The result must still be a set of records: missing ids are assigned,
    /// and a duplicate id fails the whole operation.
    fn replace_with(&self, derive: impl FnOnce(Vec<Value>) -> Vec<Value>) -> CoreResult<Vec<Value>> {
        self.db.mutate(|state| {
            let current = state.doc.sequence(&self.name)?.to_vec();
            let mut next = derive(current);

            let mut seen = HashSet::with_capacity(next.len());
            for record in &mut next {
                let id = prepare_record(record)?;
                if !seen.insert(to_canonical_cbor(&id)?) {
                    return Err(CoreError::duplicate_id(&self.name, id.to_string()));
                }
            }

            state.doc.sequence_mut(&self.name)?.clone_from(&next);
            state.refs.revalidate_store(&state.doc, &self.name);
            Ok(next)
        })
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Checks that `record` can be stored and returns its id, assigning a fresh
/// one when the id is absent or null.
fn prepare_record(record: &mut Value) -> CoreResult<Value> {
    let kind = record.kind();
    let Some(fields) = record.as_map_mut() else {
        return Err(CoreError::invalid_record(format!(
            "records must be maps, got {kind}"
        )));
    };
    fields.values().try_for_each(|value| check_item(value, 1))?;

    match fields.get(ID_FIELD) {
        None | Some(Value::Null) => {}
        Some(id @ (Value::Text(_) | Value::Integer(_))) => return Ok(id.clone()),
        Some(other) => {
            return Err(CoreError::invalid_record(format!(
                "record id must be text or an integer, got {}",
                other.kind()
            )))
        }
    }

    let id = Value::from(Uuid::new_v4().to_string());
    fields.insert(ID_FIELD.to_string(), id.clone());
    Ok(id)
}

fn merge(fields: &mut Map, patch: &Map) {
    for (key, value) in patch {
        if key != ID_FIELD {
            fields.insert(key.clone(), value.clone());
        }
    }
}
