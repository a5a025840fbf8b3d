//! Extended-type envelope: how values a format cannot carry natively are
//! written as plain `{"type": <tag>, "data": <payload>}` objects and revived.
//!
//! Each codec picks a [`Protocol`] describing what its wire format already
//! supports. [`Protocol::replace`] lowers a [`Value`] to that subset and
//! [`Protocol::revive`] lifts it back. A user object that happens to look
//! like an envelope is escaped by prefixing `!` to its `type`, and the
//! reviver strips exactly one `!`.

use chrono::{DateTime, Utc};
use url::Url;

use crate::error::EnvelopeError;
use crate::hash::Digest;
use crate::value::{Attachment, AttachmentRef, Object, Value, ValueMap, ValueSet, MAX_DEPTH};

/// Reserved envelope tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Buffer,
    Set,
    Map,
    Date,
    Url,
    BigInteger,
    Constant,
    AttachmentRef,
    Attachment,
}

impl Tag {
    pub const ALL: [Tag; 9] = [
        Tag::Buffer,
        Tag::Set,
        Tag::Map,
        Tag::Date,
        Tag::Url,
        Tag::BigInteger,
        Tag::Constant,
        Tag::AttachmentRef,
        Tag::Attachment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Buffer => "Buffer",
            Tag::Set => "Set",
            Tag::Map => "Map",
            Tag::Date => "Date",
            Tag::Url => "URL",
            Tag::BigInteger => "BigInteger",
            Tag::Constant => "constant",
            Tag::AttachmentRef => "AttachmentRef",
            Tag::Attachment => "Attachment",
        }
    }

    pub fn parse(s: &str) -> Option<Tag> {
        Tag::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// How byte strings are written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferEncoding {
    /// Format has a native byte-string type.
    Native,
    /// `{"type":"Buffer","data":[1,2,3]}`
    ByteArray,
    /// `{"type":"Buffer","data":"010203"}`
    Hex,
}

/// Which user objects get a `!` prefix on their `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapePolicy {
    /// Escape only objects whose `type` is a reserved tag or already
    /// starts with `!`; other `{type, data}` objects pass through.
    Reserved,
    /// Escape every `{type, data}` object with a string `type`. On decode an
    /// unescaped object with an unknown tag is rejected.
    All,
}

/// Per-format capabilities driving replacement and revival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protocol {
    pub buffers: BufferEncoding,
    pub native_sets: bool,
    /// `NaN` and the infinities are plain numbers on the wire.
    pub native_non_finite: bool,
    pub escape: EscapePolicy,
}

impl Protocol {
    pub const JSON: Protocol = Protocol {
        buffers: BufferEncoding::ByteArray,
        native_sets: false,
        native_non_finite: false,
        escape: EscapePolicy::Reserved,
    };

    pub const YAML: Protocol = Protocol {
        buffers: BufferEncoding::Hex,
        native_sets: false,
        native_non_finite: false,
        escape: EscapePolicy::Reserved,
    };

    pub const MSGPACK: Protocol = Protocol {
        buffers: BufferEncoding::Native,
        native_sets: true,
        native_non_finite: true,
        escape: EscapePolicy::All,
    };

    /// Lowers `value` to the subset this format carries natively.
    pub fn replace(&self, value: &Value) -> Value {
        match value {
            Value::Null | Value::Bool(_) | Value::String(_) => value.clone(),
            Value::Undefined => constant("undefined"),
            Value::Number(n) => {
                if n.is_finite() || self.native_non_finite {
                    Value::Number(*n)
                } else if n.is_nan() {
                    constant("NaN")
                } else if *n > 0.0 {
                    constant("Infinity")
                } else {
                    constant("-Infinity")
                }
            }
            Value::BigInteger(n) => envelope(Tag::BigInteger, Value::String(n.to_string())),
            Value::Bytes(data) => self.replace_bytes(data),
            Value::List(items) => Value::List(items.iter().map(|v| self.replace(v)).collect()),
            Value::Object(obj) => {
                let replaced: Object = obj
                    .iter()
                    .map(|(k, v)| (k.clone(), self.replace(v)))
                    .collect();
                Value::Object(self.escape(replaced))
            }
            Value::Map(map) => envelope(
                Tag::Map,
                Value::List(
                    map.iter()
                        .map(|(k, v)| Value::List(vec![self.replace(k), self.replace(v)]))
                        .collect(),
                ),
            ),
            Value::Set(set) => {
                let members = set.iter().map(|v| self.replace(v));
                if self.native_sets {
                    Value::Set(members.collect())
                } else {
                    envelope(Tag::Set, Value::List(members.collect()))
                }
            }
            Value::Date(at) => envelope(Tag::Date, Value::Number(at.timestamp_millis() as f64)),
            Value::Url(url) => envelope(Tag::Url, Value::String(url.as_str().to_owned())),
            Value::AttachmentRef(r) => envelope(Tag::AttachmentRef, Value::Object(ref_fields(r))),
            Value::Attachment(a) => {
                let mut fields = ref_fields(&a.reference);
                fields.insert("data".to_owned(), self.replace_bytes(&a.data));
                envelope(Tag::Attachment, Value::Object(fields))
            }
        }
    }

    fn replace_bytes(&self, data: &[u8]) -> Value {
        match self.buffers {
            BufferEncoding::Native => Value::Bytes(data.to_vec()),
            BufferEncoding::ByteArray => envelope(
                Tag::Buffer,
                Value::List(data.iter().map(|b| Value::Number(*b as f64)).collect()),
            ),
            BufferEncoding::Hex => envelope(Tag::Buffer, Value::String(hex::encode(data))),
        }
    }

    fn escape(&self, mut obj: Object) -> Object {
        let Some(kind) = envelope_type(&obj) else {
            return obj;
        };
        let needs_escape = match self.escape {
            EscapePolicy::All => true,
            EscapePolicy::Reserved => kind.starts_with('!') || Tag::parse(kind).is_some(),
        };
        if needs_escape {
            let escaped = format!("!{kind}");
            obj.insert("type".to_owned(), Value::String(escaped));
        }
        obj
    }

    /// Lifts a decoded tree back to the full value model. Trees nested
    /// deeper than [`MAX_DEPTH`] containers are rejected.
    pub fn revive(&self, value: Value) -> Result<Value, EnvelopeError> {
        self.revive_at(value, 0)
    }

    fn revive_at(&self, value: Value, depth: usize) -> Result<Value, EnvelopeError> {
        let is_container = matches!(
            value,
            Value::List(_) | Value::Object(_) | Value::Set(_) | Value::Map(_)
        );
        if is_container && depth >= MAX_DEPTH {
            return Err(EnvelopeError::TooDeep);
        }
        let depth = depth + 1;
        match value {
            Value::List(items) => Ok(Value::List(
                items
                    .into_iter()
                    .map(|v| self.revive_at(v, depth))
                    .collect::<Result<_, _>>()?,
            )),
            Value::Object(obj) => {
                let revived = obj
                    .into_iter()
                    .map(|(k, v)| Ok((k, self.revive_at(v, depth)?)))
                    .collect::<Result<Object, EnvelopeError>>()?;
                self.revive_object(revived)
            }
            Value::Set(set) => Ok(Value::Set(
                set.into_iter()
                    .map(|v| self.revive_at(v, depth))
                    .collect::<Result<_, _>>()?,
            )),
            Value::Map(map) => Ok(Value::Map(
                map.into_iter()
                    .map(|(k, v)| Ok((self.revive_at(k, depth)?, self.revive_at(v, depth)?)))
                    .collect::<Result<ValueMap, EnvelopeError>>()?,
            )),
            other => Ok(other),
        }
    }

    /// Revives a single object whose members are already revived. Decoders
    /// that build objects bottom-up call this as each object closes.
    pub fn revive_object(&self, mut obj: Object) -> Result<Value, EnvelopeError> {
        let Some(kind) = envelope_type(&obj) else {
            return Ok(Value::Object(obj));
        };
        if let Some(unescaped) = kind.strip_prefix('!') {
            let unescaped = unescaped.to_owned();
            obj.insert("type".to_owned(), Value::String(unescaped));
            return Ok(Value::Object(obj));
        }
        match Tag::parse(kind) {
            Some(tag) => {
                let data = obj.swap_remove("data").unwrap_or(Value::Null);
                decode_envelope(tag, data)
            }
            None => match self.escape {
                EscapePolicy::All => Err(EnvelopeError::UnknownTag(kind.to_owned())),
                EscapePolicy::Reserved => Ok(Value::Object(obj)),
            },
        }
    }
}

/// The `type` of a two-member `{type, data}` object, if it is a string.
fn envelope_type(obj: &Object) -> Option<&str> {
    if obj.len() != 2 || !obj.contains_key("data") {
        return None;
    }
    obj.get("type").and_then(Value::as_str)
}

fn envelope(tag: Tag, data: Value) -> Value {
    let mut obj = Object::with_capacity(2);
    obj.insert("type".to_owned(), Value::String(tag.as_str().to_owned()));
    obj.insert("data".to_owned(), data);
    Value::Object(obj)
}

fn constant(name: &str) -> Value {
    envelope(Tag::Constant, Value::String(name.to_owned()))
}

fn ref_fields(r: &AttachmentRef) -> Object {
    let mut fields = Object::with_capacity(3);
    fields.insert("hash".to_owned(), Value::String(r.hash_hex()));
    fields.insert("mimeType".to_owned(), Value::String(r.mime_type.clone()));
    fields
}

fn decode_envelope(tag: Tag, data: Value) -> Result<Value, EnvelopeError> {
    let malformed = || EnvelopeError::Malformed { tag: tag.as_str() };
    match tag {
        Tag::Buffer => decode_bytes(data).ok_or_else(malformed).map(Value::Bytes),
        Tag::Set => match data {
            Value::List(items) => Ok(Value::Set(items.into_iter().collect::<ValueSet>())),
            _ => Err(malformed()),
        },
        Tag::Map => {
            let Value::List(pairs) = data else {
                return Err(malformed());
            };
            let mut map = ValueMap::new();
            for pair in pairs {
                match pair {
                    Value::List(kv) if kv.len() == 2 => {
                        let mut kv = kv.into_iter();
                        let (Some(k), Some(v)) = (kv.next(), kv.next()) else {
                            return Err(malformed());
                        };
                        map.insert(k, v);
                    }
                    _ => return Err(malformed()),
                }
            }
            Ok(Value::Map(map))
        }
        Tag::Date => match data {
            Value::Number(ms) if ms.is_finite() => {
                Value::date_millis(ms as i64).ok_or_else(malformed)
            }
            Value::String(s) => DateTime::parse_from_rfc3339(&s)
                .map(|at| Value::date(at.with_timezone(&Utc)))
                .map_err(|_| malformed()),
            _ => Err(malformed()),
        },
        Tag::Url => match data {
            Value::String(s) => Url::parse(&s).map(Value::Url).map_err(|_| malformed()),
            _ => Err(malformed()),
        },
        Tag::BigInteger => match data {
            Value::String(s) => s.parse().map(Value::BigInteger).map_err(|_| malformed()),
            _ => Err(malformed()),
        },
        Tag::Constant => match data.as_str() {
            Some("undefined") => Ok(Value::Undefined),
            Some("NaN") => Ok(Value::Number(f64::NAN)),
            Some("Infinity") => Ok(Value::Number(f64::INFINITY)),
            Some("-Infinity") => Ok(Value::Number(f64::NEG_INFINITY)),
            _ => Err(malformed()),
        },
        Tag::AttachmentRef => {
            let Value::Object(fields) = data else {
                return Err(malformed());
            };
            decode_ref(&fields)
                .map(Value::AttachmentRef)
                .ok_or_else(malformed)
        }
        Tag::Attachment => {
            let Value::Object(mut fields) = data else {
                return Err(malformed());
            };
            let payload = fields.swap_remove("data").and_then(decode_bytes);
            match (decode_ref(&fields), payload) {
                (Some(reference), Some(data)) => {
                    Ok(Value::Attachment(Attachment { reference, data }))
                }
                _ => Err(malformed()),
            }
        }
    }
}

/// Accepts every buffer form any protocol writes: native bytes, byte array
/// or hex string.
fn decode_bytes(data: Value) -> Option<Vec<u8>> {
    match data {
        Value::Bytes(b) => Some(b),
        Value::String(s) => hex::decode(s).ok(),
        Value::List(items) => items
            .iter()
            .map(|v| match v {
                Value::Number(n) if n.fract() == 0.0 && (0.0..=255.0).contains(n) => {
                    Some(*n as u8)
                }
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn decode_ref(fields: &Object) -> Option<AttachmentRef> {
    let hash = fields.get("hash").and_then(Value::as_str)?;
    let digest: Digest = hex::decode(hash).ok()?.try_into().ok()?;
    let mime_type = fields.get("mimeType").and_then(Value::as_str)?;
    Some(AttachmentRef::new(digest, mime_type))
}
