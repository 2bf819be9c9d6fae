//! Content-derived references to stored values.
//!
//! A reference id is the hex form of the first 12 bytes of a SHA-256 digest
//! over the canonical CBOR encoding of a value, or of only the fields named in
//! `props`. The resolver keeps a side index from reference id to the location
//! of the value (collection and record id, or map and key). Every mutation
//! revalidates the entries of the store it touched, so a reference resolves
//! only while the referenced projection is still in place. Nothing cascades.
//!
//! An entry whose value disappears is kept as a tombstone rather than
//! forgotten. When a value with the same projection shows up again in the
//! same store, the reference resolves again.

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::selector::ID_FIELD;
use runedb_codec::{to_canonical_cbor, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::warn;

/// Field name of a reference marker: `{"$ref": "<id>"}`.
pub const REF_FIELD: &str = "$ref";

/// Number of digest bytes kept in a reference id.
const DIGEST_LEN: usize = 12;

/// Builds the marker that [`Collection::read`](crate::Collection::read)
/// replaces with the referenced value when evaluating.
#[must_use]
pub fn ref_marker(ref_id: &str) -> Value {
    Value::map(vec![(REF_FIELD, Value::from(ref_id))])
}

/// Splits a `props` argument into field names.
///
/// Names are separated by commas or whitespace; duplicates are dropped and
/// order is kept.
#[must_use]
pub fn parse_props(props: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in props.split(|c: char| c == ',' || c.is_whitespace()) {
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// The part of `value` a reference covers.
///
/// With `props`, `value` must be a map holding every named field; the result
/// is the map of just those fields.
fn project(value: &Value, props: Option<&[String]>) -> Option<Value> {
    let Some(props) = props else {
        return Some(value.clone());
    };
    let fields = value.as_map()?;
    let mut projection = Map::new();
    for prop in props {
        projection.insert(prop.clone(), fields.get(prop)?.clone());
    }
    Some(Value::Map(projection))
}

fn digest(projection: &Value, subset: bool) -> CoreResult<String> {
    let encoded = to_canonical_cbor(projection)?;
    let mut hasher = Sha256::new();
    // Keeps a full-value reference distinct from a subset covering every field.
    let domain: &[u8] = if subset { b"subset" } else { b"full" };
    hasher.update(domain);
    hasher.update(&encoded);
    let hash = hasher.finalize();

    let mut out = String::with_capacity(DIGEST_LEN * 2);
    for byte in &hash[..DIGEST_LEN] {
        let _ = write!(out, "{byte:02x}");
    }
    Ok(out)
}

/// Where a referenced value lives.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// A record of a collection, by id.
    Record {
        /// Collection name.
        collection: String,
        /// Record id.
        id: Value,
    },
    /// An entry of a key-value map.
    Entry {
        /// Map name.
        map: String,
        /// Entry key.
        key: String,
    },
}

impl Location {
    /// Name of the collection or map holding the value.
    #[must_use]
    pub fn store(&self) -> &str {
        match self {
            Self::Record { collection, .. } => collection,
            Self::Entry { map, .. } => map,
        }
    }

    fn lookup<'a>(&self, doc: &'a Document) -> Option<&'a Value> {
        match self {
            Self::Record { collection, id } => doc.record(collection, id),
            Self::Entry { map, key } => doc.entry(map, key),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RefEntry {
    /// Current location, or the last one for a tombstone.
    location: Location,
    props: Option<Vec<String>>,
    live: bool,
}

impl RefEntry {
    fn to_value(&self) -> Value {
        let mut fields = Map::new();
        match &self.location {
            Location::Record { collection, id } => {
                fields.insert("collection".into(), Value::from(collection.as_str()));
                fields.insert("id".into(), id.clone());
            }
            Location::Entry { map, key } => {
                fields.insert("map".into(), Value::from(map.as_str()));
                fields.insert("key".into(), Value::from(key.as_str()));
            }
        }
        fields.insert(
            "props".into(),
            self.props
                .as_ref()
                .map_or(Value::Null, |props| Value::from(props.clone())),
        );
        if !self.live {
            fields.insert("live".into(), Value::Bool(false));
        }
        Value::Map(fields)
    }

    fn from_value(value: &Value) -> Option<Self> {
        let location = match (value.get("collection"), value.get("map")) {
            (Some(Value::Text(collection)), None) => Location::Record {
                collection: collection.clone(),
                id: value.get("id")?.clone(),
            },
            (None, Some(Value::Text(map))) => Location::Entry {
                map: map.clone(),
                key: value.get("key")?.as_text()?.to_string(),
            },
            _ => return None,
        };
        let props = match value.get("props") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|p| p.as_text().map(str::to_string))
                    .collect::<Option<Vec<_>>>()?,
            ),
            Some(_) => return None,
        };
        let live = match value.get("live") {
            None => true,
            Some(live) => live.as_bool()?,
        };
        Some(Self {
            location,
            props,
            live,
        })
    }
}

/// Side index from reference id to location.
#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    entries: BTreeMap<String, RefEntry>,
}

impl ReferenceResolver {
    /// Number of references that currently resolve.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().filter(|entry| entry.live).count()
    }

    /// Returns true if no reference currently resolves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.entries.values().any(|entry| entry.live)
    }

    /// Number of tombstoned references waiting for their value to return.
    #[must_use]
    pub fn tombstones(&self) -> usize {
        self.entries.len() - self.len()
    }

    /// Location currently indexed for `ref_id`.
    #[must_use]
    pub fn location(&self, ref_id: &str) -> Option<&Location> {
        self.entries
            .get(ref_id)
            .filter(|entry| entry.live)
            .map(|entry| &entry.location)
    }

    /// Computes the reference id of `value` and indexes where it lives.
    ///
    /// Returns `Ok(None)` if a `props` field is missing or no stored value
    /// matches. The boolean is true when the index changed.
    pub(crate) fn make_ref(
        &mut self,
        doc: &Document,
        value: &Value,
        props: Option<&str>,
    ) -> CoreResult<(Option<String>, bool)> {
        let props = props.map(parse_props).filter(|p| !p.is_empty());
        let Some(projection) = project(value, props.as_deref()) else {
            return Ok((None, false));
        };
        let ref_id = digest(&projection, props.is_some())?;

        if self.resolve(doc, &ref_id).is_some() {
            return Ok((Some(ref_id), false));
        }
        let Some(location) = locate(doc, &projection, props.as_deref()) else {
            return Ok((None, false));
        };
        self.entries.insert(
            ref_id.clone(),
            RefEntry {
                location,
                props,
                live: true,
            },
        );
        Ok((Some(ref_id), true))
    }

    /// The live value behind `ref_id`, if it still matches.
    pub(crate) fn resolve<'a>(&self, doc: &'a Document, ref_id: &str) -> Option<&'a Value> {
        let entry = self.entries.get(ref_id).filter(|entry| entry.live)?;
        let value = entry.location.lookup(doc)?;
        let projection = project(value, entry.props.as_deref())?;
        match digest(&projection, entry.props.is_some()) {
            Ok(current) if current == ref_id => Some(value),
            _ => None,
        }
    }

    /// Brings the entries of `store` in line with `doc`. Returns the number
    /// of references that stopped resolving.
    pub(crate) fn revalidate_store(&mut self, doc: &Document, store: &str) -> usize {
        self.refresh(doc, |location| location.store() == store)
    }

    /// Brings every entry in line with `doc`. Returns the number of
    /// references that stopped resolving.
    pub(crate) fn revalidate_all(&mut self, doc: &Document) -> usize {
        self.refresh(doc, |_| true)
    }

    /// Entries in scope that no longer resolve are looked up again in their
    /// own store by digest; those still missing become tombstones.
    fn refresh(&mut self, doc: &Document, scope: impl Fn(&Location) -> bool) -> usize {
        let pending: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| scope(&entry.location))
            .map(|(ref_id, _)| ref_id.clone())
            .filter(|ref_id| self.resolve(doc, ref_id).is_none())
            .collect();

        let mut dropped = 0;
        for ref_id in pending {
            let Some(entry) = self.entries.get_mut(&ref_id) else {
                continue;
            };
            match relocate(doc, &ref_id, entry) {
                Some(location) => {
                    entry.location = location;
                    entry.live = true;
                }
                None if entry.live => {
                    entry.live = false;
                    dropped += 1;
                }
                None => {}
            }
        }
        dropped
    }

    /// Replaces every `{"$ref": id}` marker inside `value` with the referenced
    /// value, or null when the reference no longer resolves.
    ///
    /// Resolved values are inserted as stored; markers inside them are left
    /// alone so cyclic references terminate.
    pub(crate) fn evaluate(&self, doc: &Document, value: &Value) -> Value {
        match value {
            Value::Map(fields) => {
                if let (1, Some(Value::Text(ref_id))) = (fields.len(), fields.get(REF_FIELD)) {
                    return self.resolve(doc, ref_id).cloned().unwrap_or(Value::Null);
                }
                Value::Map(
                    fields
                        .iter()
                        .map(|(k, v)| (k.clone(), self.evaluate(doc, v)))
                        .collect(),
                )
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.evaluate(doc, item)).collect())
            }
            other => other.clone(),
        }
    }

    /// Persisted form: a map from reference id to location.
    pub(crate) fn to_value(&self) -> Value {
        Value::Map(
            self.entries
                .iter()
                .map(|(ref_id, entry)| (ref_id.clone(), entry.to_value()))
                .collect(),
        )
    }

    /// Loads a persisted index, skipping malformed entries.
    pub(crate) fn from_value(value: &Value) -> CoreResult<Self> {
        let entries = match value {
            Value::Null => return Ok(Self::default()),
            Value::Map(entries) => entries,
            other => {
                return Err(CoreError::corrupt_store(format!(
                    "reference index is a {}, expected a map",
                    other.kind()
                )))
            }
        };

        let mut resolver = Self::default();
        for (ref_id, raw) in entries {
            match RefEntry::from_value(raw) {
                Some(entry) => {
                    resolver.entries.insert(ref_id.clone(), entry);
                }
                None => warn!(ref_id = %ref_id, "skipping malformed reference entry"),
            }
        }
        Ok(resolver)
    }
}

/// First value in the store `entry` last pointed into whose projection
/// digests to `ref_id`.
fn relocate(doc: &Document, ref_id: &str, entry: &RefEntry) -> Option<Location> {
    let store = entry.location.store();
    let props = entry.props.as_deref();
    let matches = |value: &Value| {
        project(value, props)
            .and_then(|projection| digest(&projection, props.is_some()).ok())
            .is_some_and(|digest| digest == ref_id)
    };

    match doc.get(store)? {
        Value::Array(records) => records.iter().find_map(|record| {
            let id = record.get(ID_FIELD)?;
            matches(record).then(|| Location::Record {
                collection: store.to_string(),
                id: id.clone(),
            })
        }),
        Value::Map(entries) => entries
            .iter()
            .find(|(_, value)| matches(*value))
            .map(|(key, _)| Location::Entry {
                map: store.to_string(),
                key: key.clone(),
            }),
        _ => None,
    }
}

/// First stored value whose projection equals `projection`, searching root
/// entries in name order and each store in its own order.
fn locate(doc: &Document, projection: &Value, props: Option<&[String]>) -> Option<Location> {
    for (name, store) in doc.iter() {
        match store {
            Value::Array(records) => {
                for record in records {
                    let Some(id) = record.get(ID_FIELD) else {
                        continue;
                    };
                    if project(record, props).as_ref() == Some(projection) {
                        return Some(Location::Record {
                            collection: name.to_string(),
                            id: id.clone(),
                        });
                    }
                }
            }
            Value::Map(entries) => {
                for (key, value) in entries {
                    if project(value, props).as_ref() == Some(projection) {
                        return Some(Location::Entry {
                            map: name.to_string(),
                            key: key.clone(),
                        });
                    }
                }
            }
            _ => {}
        }
    }
    None
}
