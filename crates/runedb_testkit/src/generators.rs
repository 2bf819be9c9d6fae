//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random documents, records and
//! store operations that stay within what a database accepts.

use proptest::prelude::*;
use runedb_core::{Map, Value, ID_FIELD};

/// Strategy for generating valid store names.
pub fn store_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}")
        .expect("Invalid regex")
        .prop_filter("Store names must not shadow the stack", |s| s != "_stack")
}

/// Strategy for generating scalar values. Floats are always finite.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e9..1.0e9f64).prop_map(Value::Float),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Text),
    ]
}

/// Strategy for generating nested values up to a small depth.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

/// Strategy for generating record ids (text or integer).
pub fn record_id_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Integer),
        "[a-z0-9]{1,12}".prop_map(Value::Text),
    ]
}

/// Strategy for generating records without an `id` field.
pub fn record_body_strategy() -> impl Strategy<Value = Map> {
    prop::collection::btree_map("[a-z]{1,6}", value_strategy(), 0..5).prop_map(|mut fields| {
        fields.remove(ID_FIELD);
        fields
    })
}

/// Strategy for generating records carrying an explicit id.
pub fn record_strategy() -> impl Strategy<Value = Value> {
    (record_id_strategy(), record_body_strategy()).prop_map(|(id, mut fields)| {
        fields.insert(ID_FIELD.to_string(), id);
        Value::Map(fields)
    })
}

/// Strategy for generating records with a `rank` field drawn from a small
/// range, so sorts see many ties.
pub fn ranked_record_strategy(max_rank: i64) -> impl Strategy<Value = Value> {
    (0..max_rank).prop_map(|rank| Value::map(vec![("rank", Value::from(rank))]))
}

/// An operation on a collection, used to drive model-based tests.
#[derive(Debug, Clone)]
pub enum RecordOperation {
    /// Insert a record.
    Insert {
        /// Record id.
        id: i64,
        /// Payload stored under `body`.
        body: Value,
    },
    /// Remove the record with `id`.
    Remove {
        /// Record id.
        id: i64,
    },
    /// Read the record with `id`.
    Read {
        /// Record id.
        id: i64,
    },
}

/// Strategy for generating collection operations over a small id space.
pub fn record_operation_strategy() -> impl Strategy<Value = RecordOperation> {
    prop_oneof![
        3 => (0..16i64, scalar_strategy())
            .prop_map(|(id, body)| RecordOperation::Insert { id, body }),
        1 => (0..16i64).prop_map(|id| RecordOperation::Remove { id }),
        2 => (0..16i64).prop_map(|id| RecordOperation::Read { id }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<RecordOperation>> {
    prop::collection::vec(record_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
