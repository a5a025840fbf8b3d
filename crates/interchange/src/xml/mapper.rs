//! Mapping between values and markup.
//!
//! A value that is already a tagged tree is written as literal markup.
//! Anything else is encoded element by element and the root is marked
//! with [`ARBITRARY_NS`]; decoding a root carrying that namespace inverts
//! the encoding, and any other document comes back as a tagged tree.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use url::Url;

use super::parser::XmlError;
use super::tree::{Element, Node};
use crate::hash::Digest;
use crate::json::format_number;
use crate::value::{Attachment, AttachmentRef, Object, Value, ValueMap, ValueSet};

/// Namespace marking a document as an encoded value rather than markup.
pub const ARBITRARY_NS: &str = "urn:interchange:arbitrary";

/// Document root for `value`.
pub fn to_document(value: &Value) -> Element {
    if let Some(tree) = Element::from_value(value) {
        if tree.get_attr("xmlns") != Some(ARBITRARY_NS) {
            return tree;
        }
    }
    encode_arbitrary(value).attr("xmlns", ARBITRARY_NS)
}

/// Inverse of [`to_document`].
pub fn from_document(root: &Element) -> Result<Value, XmlError> {
    if root.get_attr("xmlns") == Some(ARBITRARY_NS) {
        decode_arbitrary(root)
    } else {
        Ok(root.to_value())
    }
}

/// Encodes one value without the namespace marker.
pub fn encode_arbitrary(value: &Value) -> Element {
    match value {
        Value::Null => Element::new("null"),
        Value::Undefined => Element::new("undefined"),
        Value::Bool(true) => Element::new("true"),
        Value::Bool(false) => Element::new("false"),
        Value::Number(n) => Element::new("number").text(number_text(*n)),
        Value::BigInteger(n) => Element::new("bigint").text(n.to_string()),
        Value::String(s) => text_element("string", s),
        Value::Bytes(b) => base64_element("buffer", b),
        Value::List(items) => items
            .iter()
            .fold(Element::new("array"), |el, v| el.child(encode_arbitrary(v))),
        Value::Object(obj) => obj.iter().fold(Element::new("object"), |el, (k, v)| {
            el.child(encode_arbitrary(v).attr("name", k.as_str()))
        }),
        Value::Map(map) => map.iter().fold(Element::new("map"), |el, (k, v)| {
            el.child(
                Element::new("entry")
                    .child(encode_arbitrary(k))
                    .child(encode_arbitrary(v)),
            )
        }),
        Value::Set(set) => set
            .iter()
            .fold(Element::new("set"), |el, v| el.child(encode_arbitrary(v))),
        Value::Date(at) => {
            Element::new("date").text(at.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        Value::Url(url) => Element::new("url").text(url.as_str()),
        Value::AttachmentRef(r) => with_ref(Element::new("attachment-ref"), r),
        Value::Attachment(a) => {
            let el = with_ref(Element::new("attachment"), &a.reference).attr("encoding", "base64");
            if a.data.is_empty() {
                el
            } else {
                el.text(STANDARD.encode(&a.data))
            }
        }
    }
}

fn text_element(tag: &str, text: &str) -> Element {
    let el = Element::new(tag);
    if text.is_empty() {
        el
    } else {
        el.text(text)
    }
}

fn base64_element(tag: &str, data: &[u8]) -> Element {
    text_element(tag, &STANDARD.encode(data)).attr("encoding", "base64")
}

fn with_ref(el: Element, r: &AttachmentRef) -> Element {
    el.attr("hash", r.hash_hex())
        .attr("mime-type", r.mime_type.as_str())
}

fn number_text(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_owned()
    } else {
        format_number(n)
    }
}

fn invalid(el: &Element) -> XmlError {
    XmlError::InvalidContent {
        tag: el.tag.clone(),
    }
}

/// Decodes an element written by [`encode_arbitrary`]. Unknown attributes
/// are ignored and whitespace-only text inside containers is skipped. An
/// export record (`<entry>` outside a map) decodes to the value it wraps.
pub fn decode_arbitrary(el: &Element) -> Result<Value, XmlError> {
    Ok(match el.tag.as_str() {
        "null" => Value::Null,
        "undefined" => Value::Undefined,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "number" => Value::Number(parse_number(el.inner_text().trim()).ok_or_else(|| invalid(el))?),
        "bigint" => Value::BigInteger(el.inner_text().trim().parse().map_err(|_| invalid(el))?),
        "string" => Value::String(el.inner_text()),
        "buffer" => Value::Bytes(decode_data(el)?),
        "array" => Value::List(children(el).map(decode_arbitrary).collect::<Result<_, _>>()?),
        "set" => Value::Set(children(el).map(decode_arbitrary).collect::<Result<ValueSet, _>>()?),
        "object" => {
            let mut obj = Object::new();
            for child in children(el) {
                let name = child.get_attr("name").ok_or_else(|| invalid(el))?;
                obj.insert(name.to_owned(), decode_arbitrary(child)?);
            }
            Value::Object(obj)
        }
        "map" => {
            let mut map = ValueMap::new();
            for entry in children(el) {
                let mut kv = children(entry);
                match (kv.next(), kv.next(), kv.next()) {
                    (Some(k), Some(v), None) if entry.tag == "entry" => {
                        map.insert(decode_arbitrary(k)?, decode_arbitrary(v)?);
                    }
                    _ => return Err(invalid(el)),
                }
            }
            Value::Map(map)
        }
        "date" => {
            let text = el.inner_text();
            let at = DateTime::parse_from_rfc3339(text.trim()).map_err(|_| invalid(el))?;
            Value::date(at.with_timezone(&Utc))
        }
        "url" => Value::Url(Url::parse(el.inner_text().trim()).map_err(|_| invalid(el))?),
        "entry" => {
            let mut inner = children(el);
            match (inner.next(), inner.next()) {
                (Some(value), None) => decode_arbitrary(value)?,
                _ => return Err(invalid(el)),
            }
        }
        "attachment-ref" => Value::AttachmentRef(decode_ref(el)?),
        "attachment" => Value::Attachment(Attachment {
            reference: decode_ref(el)?,
            data: decode_data(el)?,
        }),
        other => return Err(XmlError::UnexpectedElement(other.to_owned())),
    })
}

/// Element children, skipping text.
fn children(el: &Element) -> impl Iterator<Item = &Element> {
    el.children.iter().filter_map(|c| match c {
        Node::Element(child) => Some(child),
        Node::Text(_) => None,
    })
}

fn parse_number(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => text.parse::<f64>().ok().filter(|n| n.is_finite()),
    }
}

fn decode_data(el: &Element) -> Result<Vec<u8>, XmlError> {
    let text = el.inner_text();
    let text = text.trim();
    match el.get_attr("encoding") {
        Some("base64") => STANDARD.decode(text).map_err(|_| invalid(el)),
        Some("hex") => hex::decode(text).map_err(|_| invalid(el)),
        Some("utf8") | None => Ok(text.as_bytes().to_vec()),
        Some(_) => Err(invalid(el)),
    }
}

fn decode_ref(el: &Element) -> Result<AttachmentRef, XmlError> {
    let hash = el.get_attr("hash").ok_or_else(|| invalid(el))?;
    let mime = el.get_attr("mime-type").ok_or_else(|| invalid(el))?;
    let mut digest: Digest = [0; 32];
    hex::decode_to_slice(hash, &mut digest).map_err(|_| invalid(el))?;
    Ok(AttachmentRef::new(digest, mime))
}
