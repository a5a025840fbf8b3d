//! The in-memory value model shared by every codec.
//!
//! [`Value`] is the closed set of types the engine can carry between
//! formats. Codecs that cannot represent a variant natively route it through
//! the extended-type envelope in [`crate::protocol`].

mod attachment;
mod bigint;
mod collections;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use url::Url;

pub use attachment::{Attachment, AttachmentRef};
pub use bigint::{BigInteger, ParseBigIntegerError};
pub use collections::{ValueMap, ValueSet};

/// Deepest container nesting the decoders accept.
pub const MAX_DEPTH: usize = 512;

/// Ordered string-keyed object. Key order is insertion order.
pub type Object = IndexMap<String, Value>;

/// A dynamically-typed value.
///
/// Equality is deep and structural: `NaN` equals `NaN`, objects, maps and
/// sets compare independently of entry order, dates compare by millisecond.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Undefined,
    Bool(bool),
    Number(f64),
    BigInteger(BigInteger),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Object(Object),
    Map(ValueMap),
    Set(ValueSet),
    Date(DateTime<Utc>),
    Url(Url),
    AttachmentRef(AttachmentRef),
    Attachment(Attachment),
}

impl Value {
    /// Short lowercase name of the variant, used in error messages and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInteger(_) => "bigint",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Date(_) => "date",
            Value::Url(_) => "url",
            Value::AttachmentRef(_) => "attachment-ref",
            Value::Attachment(_) => "attachment",
        }
    }

    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(data.into())
    }

    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Builds an object from key/value pairs. Later duplicates overwrite
    /// earlier ones but keep the first position.
    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Builds a set; repeated members are dropped.
    pub fn set<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Value::Set(items.into_iter().map(Into::into).collect())
    }

    /// A date truncated to millisecond precision.
    pub fn date(at: DateTime<Utc>) -> Self {
        match DateTime::from_timestamp_millis(at.timestamp_millis()) {
            Some(truncated) => Value::Date(truncated),
            None => Value::Date(at),
        }
    }

    /// A date from milliseconds since the Unix epoch, `None` when out of range.
    pub fn date_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Value::Date)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Looks up an object member by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|obj| obj.get(key))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::BigInteger(a), Value::BigInteger(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            // IndexMap equality ignores order.
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a.timestamp_millis() == b.timestamp_millis(),
            (Value::Url(a), Value::Url(b)) => a == b,
            (Value::AttachmentRef(a), Value::AttachmentRef(b)) => a == b,
            (Value::Attachment(a), Value::Attachment(b)) => a == b,
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => Value::List(arr.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(obj) => {
                Value::Object(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

number_from!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::Object(obj)
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Value::Map(map)
    }
}

impl From<ValueSet> for Value {
    fn from(set: ValueSet) -> Self {
        Value::Set(set)
    }
}

impl From<BigInteger> for Value {
    fn from(n: BigInteger) -> Self {
        Value::BigInteger(n)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(at: DateTime<Utc>) -> Self {
        Value::date(at)
    }
}

impl From<Url> for Value {
    fn from(url: Url) -> Self {
        Value::Url(url)
    }
}

impl From<AttachmentRef> for Value {
    fn from(r: AttachmentRef) -> Self {
        Value::AttachmentRef(r)
    }
}

impl From<Attachment> for Value {
    fn from(a: Attachment) -> Self {
        Value::Attachment(a)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nan_equals_nan() {
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_ne!(Value::Number(f64::NAN), Value::Number(0.0));
    }

    #[test]
    fn object_equality_ignores_key_order() {
        let a = Value::object([("a", 1), ("b", 2)]);
        let b = Value::object([("b", 2), ("a", 1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn list_equality_is_ordered() {
        assert_ne!(Value::list([1, 2]), Value::list([2, 1]));
    }

    #[test]
    fn date_is_truncated_to_millis() {
        let at = DateTime::from_timestamp(1_600_000_000, 123_456_789).unwrap();
        match Value::date(at) {
            Value::Date(d) => assert_eq!(d.timestamp_subsec_nanos(), 123_000_000),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn from_serde_json_keeps_order() {
        let v = Value::from(json!({"z": 1, "a": [true, null, "x"]}));
        let obj = v.as_object().unwrap();
        assert_eq!(obj.keys().collect::<Vec<_>>(), ["z", "a"]);
        assert_eq!(
            obj["a"],
            Value::List(vec![Value::Bool(true), Value::Null, Value::from("x")])
        );
    }

    #[test]
    fn kinds_differ_across_variants() {
        assert_ne!(Value::Null, Value::Undefined);
        assert_ne!(Value::from("1"), Value::from(1));
        assert_eq!(Value::Undefined.kind(), "undefined");
    }
}
