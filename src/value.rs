//! The dynamically-typed tree value the engine traverses and mutates.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;

/// A node of the data tree.
///
/// Scalars are leaves; containers own their children, so a tree can never
/// be cyclic. Mappings preserve insertion order, which defines wildcard
/// enumeration order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// Integer number, kept separate from floats.
    Int(i64),
    Float(f64),
    String(String),
    /// Timezone-aware point in time, produced by the `to_datetime` filter.
    DateTime(DateTime<FixedOffset>),
    /// High-precision decimal, produced by the `decimal` filter.
    Decimal(Decimal),
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// String-keyed mapping, insertion order preserved.
    Object(IndexMap<String, Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Decimal(_))
    }

    /// Truthiness used by predicate pipelines and the `bool` filter.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Decimal(d) => !d.is_zero(),
            Value::String(s) => !s.is_empty(),
            Value::DateTime(_) => true,
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
        }
    }

    /// Lowercase type name, matched case-insensitively by the `type_is` filter.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::Decimal(_) => "decimal",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// String rendering used by the `string` filter and string coercions:
    /// bare text for string scalars, JSON-shaped text for everything else.
    pub fn render(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Equality used by predicate comparison.
///
/// Strict-typed: no string/number coercion. `Int`, `Float` and `Decimal`
/// compare numerically with each other; everything else must match in type.
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Decimal(a), Value::Decimal(b)) => a == b,
        (a, b) if a.is_numeric() && b.is_numeric() => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        (a, b) => a == b,
    }
}

/// Ordering used by predicate comparison and the ordering filters.
///
/// Numbers order with numbers, strings with strings, bools with bools,
/// datetimes with datetimes (ISO strings coerced on the fly). Any other
/// combination is unordered and compares false, never an error.
pub(crate) fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
        (a, b) if a.is_numeric() && b.is_numeric() => {
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::DateTime(_), _) | (_, Value::DateTime(_)) => {
            let a = coerce_datetime(left, None)?;
            let b = coerce_datetime(right, None)?;
            Some(a.cmp(&b))
        }
        _ => None,
    }
}

/// Total ordering for `sorted`: unordered pairs fall back to a type rank so
/// mixed sequences sort deterministically instead of erroring.
pub(crate) fn compare_total(left: &Value, right: &Value) -> Ordering {
    match compare_values(left, right) {
        Some(ordering) => ordering,
        None => type_rank(left)
            .cmp(&type_rank(right))
            .then_with(|| left.render().cmp(&right.render())),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) | Value::Decimal(_) => 2,
        Value::String(_) => 3,
        Value::DateTime(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// Best-effort datetime coercion shared by the datetime filters and
/// datetime comparisons.
///
/// Accepts datetimes as-is, integers/floats as Unix timestamps, and strings
/// in ISO 8601 (a trailing `Z` is normalized to `+00:00`; naive timestamps
/// and bare dates are assumed UTC). With `fmt`, strings parse through the
/// given `strftime`-style format instead.
pub(crate) fn coerce_datetime(value: &Value, fmt: Option<&str>) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::DateTime(dt) => Some(*dt),
        Value::Int(n) => DateTime::from_timestamp(*n, 0).map(|dt| dt.fixed_offset()),
        Value::Float(f) => {
            DateTime::from_timestamp_millis((f * 1000.0) as i64).map(|dt| dt.fixed_offset())
        }
        Value::String(s) => {
            if let Some(fmt) = fmt {
                return DateTime::parse_from_str(s, fmt)
                    .ok()
                    .or_else(|| {
                        NaiveDateTime::parse_from_str(s, fmt)
                            .ok()
                            .map(|n| n.and_utc().fixed_offset())
                    })
                    .or_else(|| {
                        NaiveDate::parse_from_str(s, fmt)
                            .ok()
                            .and_then(|d| d.and_hms_opt(0, 0, 0))
                            .map(|n| n.and_utc().fixed_offset())
                    });
            }
            let normalized = s.replace('Z', "+00:00");
            DateTime::parse_from_rfc3339(&normalized)
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|n| n.and_utc().fixed_offset())
                })
                .or_else(|| {
                    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S%.f")
                        .ok()
                        .map(|n| n.and_utc().fixed_offset())
                })
                .or_else(|| {
                    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(|n| n.and_utc().fixed_offset())
                })
        }
        _ => None,
    }
}

impl fmt::Display for Value {
    /// JSON-shaped rendering; string scalars print bare (quoting is the
    /// `quote` filter's job), strings inside containers print quoted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            other => write_json(other, f),
        }
    }
}

fn write_json(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::Null => write!(f, "null"),
        Value::Bool(b) => write!(f, "{}", b),
        Value::Int(n) => write!(f, "{}", n),
        Value::Float(n) => write!(f, "{}", n),
        Value::String(s) => write!(f, "{}", serde_json::Value::String(s.clone())),
        Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
        Value::Decimal(d) => write!(f, "{}", d),
        Value::Array(items) => {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_json(item, f)?;
            }
            write!(f, "]")
        }
        Value::Object(map) => {
            write!(f, "{{")?;
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: ", serde_json::Value::String(key.clone()))?;
                write_json(item, f)?;
            }
            write!(f, "}}")
        }
    }
}

// --- serde_json interop ---
//
// The crate's FFI seam: callers holding `serde_json::Value` trees (built
// with `preserve_order` so mapping order survives) convert losslessly in,
// and back out with datetimes as RFC 3339 strings.

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, item)| (key, Value::from(item)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(n) => serde_json::Value::from(n),
            Value::Float(n) => serde_json::Value::from(n),
            Value::String(s) => serde_json::Value::String(s),
            Value::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Value::Decimal(d) => match d.to_string().parse::<serde_json::Number>() {
                Ok(n) => serde_json::Value::Number(n),
                Err(_) => serde_json::Value::String(d.to_string()),
            },
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(key, item)| (key, serde_json::Value::from(item)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_round_trip_preserves_order_and_types() {
        let source = json!({"b": 1, "a": [1.5, "x", null, true]});
        let value = Value::from(source.clone());

        let keys: Vec<&String> = match &value {
            Value::Object(map) => map.keys().collect(),
            _ => panic!("expected object"),
        };
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(serde_json::Value::from(value), source);
    }

    #[test]
    fn test_strict_typed_equality() {
        assert!(values_equal(&Value::Int(1), &Value::Float(1.0)));
        assert!(!values_equal(&Value::String("1".into()), &Value::Int(1)));
        assert!(!values_equal(&Value::Bool(true), &Value::Int(1)));
    }

    #[test]
    fn test_unordered_comparison_is_none() {
        assert_eq!(
            compare_values(&Value::String("a".into()), &Value::Int(1)),
            None
        );
        assert_eq!(
            compare_values(&Value::Int(1), &Value::Int(2)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_coerce_datetime_from_iso_string() {
        let dt = coerce_datetime(&Value::String("2024-06-01T12:00:00Z".into()), None);
        assert_eq!(dt.map(|d| d.timestamp()), Some(1_717_243_200));

        let bare_date = coerce_datetime(&Value::String("2024-06-01".into()), None);
        assert_eq!(bare_date.map(|d| d.timestamp()), Some(1_717_200_000));
    }

    #[test]
    fn test_render_strings_bare_and_containers_json() {
        assert_eq!(Value::String("hi".into()).render(), "hi");
        let list = Value::Array(vec![Value::Int(20)]);
        assert_eq!(list.render(), "[20]");
    }
}
