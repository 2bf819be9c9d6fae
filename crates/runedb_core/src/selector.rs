//! Record selection by id or by partial-object criteria.

use runedb_codec::{Map, Value};
use std::fmt;

/// Name of the identity field carried by every collection record.
pub const ID_FIELD: &str = "id";

/// Chooses records in a collection.
///
/// A bare string or integer selects by id, a map selects every record that is
/// a superset of it, and anything else selects nothing. Record ids are never
/// floats, so a whole-number float selects the integer id it equals and any
/// other float selects nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Record whose `id` equals the value.
    Id(Value),
    /// Records containing every key of the map with an equal value.
    Criteria(Map),
    /// Matches no record.
    Nothing,
}

impl Selector {
    /// Selects by id.
    pub fn id(id: impl Into<Value>) -> Self {
        Self::from(id.into())
    }

    /// Selects by partial-object criteria.
    pub fn criteria<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Criteria(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Returns true if `record` is selected.
    #[must_use]
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Self::Id(id) => record.get(ID_FIELD) == Some(id),
            Self::Criteria(criteria) => match record.as_map() {
                Some(fields) => criteria
                    .iter()
                    .all(|(key, expected)| fields.get(key) == Some(expected)),
                None => false,
            },
            Self::Nothing => false,
        }
    }
}

impl From<Value> for Selector {
    fn from(value: Value) -> Self {
        match value {
            Value::Text(_) | Value::Integer(_) => Self::Id(value),
            Value::Float(f) => integral(f).map_or(Self::Nothing, |n| Self::Id(Value::Integer(n))),
            Value::Map(criteria) => Self::Criteria(criteria),
            Value::Null | Value::Bool(_) | Value::Array(_) => Self::Nothing,
        }
    }
}

/// `f` as an `i64` if it is a whole number in range.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range.
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then(|| f as i64)
}

impl From<f64> for Selector {
    fn from(id: f64) -> Self {
        Self::from(Value::Float(id))
    }
}

impl From<&Value> for Selector {
    fn from(value: &Value) -> Self {
        Self::from(value.clone())
    }
}

impl From<Map> for Selector {
    fn from(criteria: Map) -> Self {
        Self::Criteria(criteria)
    }
}

impl From<&str> for Selector {
    fn from(id: &str) -> Self {
        Self::Id(Value::from(id))
    }
}

impl From<String> for Selector {
    fn from(id: String) -> Self {
        Self::Id(Value::Text(id))
    }
}

impl From<i64> for Selector {
    fn from(id: i64) -> Self {
        Self::Id(Value::Integer(id))
    }
}

impl From<i32> for Selector {
    fn from(id: i32) -> Self {
        Self::Id(Value::from(id))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {id}"),
            Self::Criteria(criteria) => write!(f, "criteria {}", Value::Map(criteria.clone())),
            Self::Nothing => f.write_str("nothing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note() -> Value {
        Value::map(vec![
            ("id", Value::from("n1")),
            ("title", Value::from("groceries")),
            ("done", Value::Bool(false)),
        ])
    }

    #[test]
    fn id_selects_identity_field() {
        assert!(Selector::from("n1").matches(&note()));
        assert!(!Selector::from("n2").matches(&note()));
        assert!(!Selector::from(1).matches(&note()));
    }

    #[test]
    fn criteria_is_partial_match() {
        assert!(Selector::criteria([("title", "groceries")]).matches(&note()));
        assert!(Selector::criteria([("title", Value::from("groceries")), ("done", Value::Bool(false))])
            .matches(&note()));
        assert!(!Selector::criteria([("title", "chores")]).matches(&note()));
        assert!(!Selector::criteria([("missing", Value::Null)]).matches(&note()));
    }

    #[test]
    fn empty_criteria_matches_every_record() {
        assert!(Selector::Criteria(Map::new()).matches(&note()));
        assert!(!Selector::Criteria(Map::new()).matches(&Value::from(3)));
    }

    #[test]
    fn value_conversion() {
        assert_eq!(Selector::from(Value::from("a")), Selector::Id(Value::from("a")));
        assert_eq!(Selector::from(Value::Float(1.5)), Selector::Nothing);
        assert_eq!(Selector::from(Value::Null), Selector::Nothing);
        assert_eq!(Selector::from(Value::Bool(true)), Selector::Nothing);
        assert_eq!(Selector::from(Value::Array(vec![])), Selector::Nothing);
        assert!(matches!(Selector::from(note()), Selector::Criteria(_)));
        assert!(!Selector::Nothing.matches(&note()));
    }

    #[test]
    fn whole_floats_select_integer_ids() {
        let record = Value::map(vec![("id", Value::from(7)), ("n", Value::from(1))]);
        assert_eq!(Selector::from(7.0), Selector::Id(Value::Integer(7)));
        assert!(Selector::from(7.0).matches(&record));
        assert!(Selector::from(Value::Float(-0.0)).matches(&Value::map(vec![("id", Value::from(0))])));

        assert_eq!(Selector::from(7.5), Selector::Nothing);
        assert_eq!(Selector::from(f64::NAN), Selector::Nothing);
        assert_eq!(Selector::from(f64::INFINITY), Selector::Nothing);
        assert_eq!(Selector::from(9.3e18), Selector::Nothing);
        assert_eq!(
            Selector::from(-9_223_372_036_854_775_808.0),
            Selector::Id(Value::Integer(i64::MIN))
        );
    }
}
