//! YAML codec over `serde_yaml`.
//!
//! Byte strings travel as hex inside the `Buffer` envelope. Streams are
//! sequences of documents, each terminated by a `...` end marker line.

use std::collections::VecDeque;

use serde_yaml::{Mapping, Number};

use crate::codec::{BoxDecoder, BoxEncoder, ByteStream, ChunkIter, Codec, ValueIter, ValueStream};
use crate::error::CodecError;
use crate::protocol::Protocol;
use crate::stream::{Pipeline, Transform};
use crate::value::{Object, Value};

/// Document end marker, preceded by the newline that ends the document.
const DOCUMENT_END: &[u8] = b"\n...\n";

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl YamlCodec {
    pub fn new() -> Self {
        Self
    }

    fn encode_string(value: &Value) -> Result<String, CodecError> {
        let yaml = to_yaml(&Protocol::YAML.replace(value))?;
        serde_yaml::to_string(&yaml).map_err(|e| CodecError::Encode {
            format: "yaml",
            reason: e.to_string(),
        })
    }
}

/// Converts a replaced value into the YAML data model.
fn to_yaml(value: &Value) -> Result<serde_yaml::Value, CodecError> {
    Ok(match value {
        Value::Null => serde_yaml::Value::Null,
        Value::Bool(b) => serde_yaml::Value::Bool(*b),
        Value::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                serde_yaml::Value::Number(Number::from(*n as i64))
            } else {
                serde_yaml::Value::Number(Number::from(*n))
            }
        }
        Value::String(s) => serde_yaml::Value::String(s.clone()),
        Value::List(items) => {
            serde_yaml::Value::Sequence(items.iter().map(to_yaml).collect::<Result<_, _>>()?)
        }
        Value::Object(obj) => {
            let mut mapping = Mapping::with_capacity(obj.len());
            for (k, v) in obj {
                mapping.insert(serde_yaml::Value::String(k.clone()), to_yaml(v)?);
            }
            serde_yaml::Value::Mapping(mapping)
        }
        other => {
            return Err(CodecError::UnsupportedType {
                format: "yaml",
                kind: other.kind(),
            })
        }
    })
}

/// Converts parsed YAML into a raw (not yet revived) value.
fn from_yaml(yaml: serde_yaml::Value) -> Result<Value, CodecError> {
    Ok(match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::List(items.into_iter().map(from_yaml).collect::<Result<_, _>>()?)
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut obj = Object::with_capacity(mapping.len());
            for (k, v) in mapping {
                obj.insert(mapping_key(k)?, from_yaml(v)?);
            }
            Value::Object(obj)
        }
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value)?,
    })
}

/// Scalar keys are stringified the way they were written.
fn mapping_key(key: serde_yaml::Value) -> Result<String, CodecError> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok("null".to_owned()),
        serde_yaml::Value::Tagged(tagged) => mapping_key(tagged.value),
        _ => Err(CodecError::UnsupportedType {
            format: "yaml",
            kind: "non-scalar mapping key",
        }),
    }
}

fn decode_document(bytes: &[u8]) -> Result<Value, CodecError> {
    let yaml: serde_yaml::Value = serde_yaml::from_slice(bytes)?;
    Ok(Protocol::YAML.revive(from_yaml(yaml)?)?)
}

impl Codec for YamlCodec {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn handles(&self) -> &'static [&'static str] {
        &["application/yaml", "application/x-yaml", "text/yaml", "text/x-yaml"]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["yaml", "yml"]
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        Self::encode_string(value).map(String::into_bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        decode_document(bytes)
    }

    fn print(&self, value: &Value) -> Result<String, CodecError> {
        Self::encode_string(value)
    }

    fn encoder(&self) -> Option<BoxEncoder> {
        Some(Box::new(YamlStreamEncoder))
    }

    fn decoder(&self) -> Option<BoxDecoder> {
        Some(Box::new(YamlStreamDecoder::default()))
    }

    fn encode_iterable<'a>(&self, values: ValueIter<'a>) -> Result<ByteStream<'a>, CodecError> {
        let encoder: BoxEncoder = Box::new(YamlStreamEncoder);
        Ok(Pipeline::new(encoder, values))
    }

    fn decode_stream<'a>(&self, chunks: ChunkIter<'a>) -> Result<ValueStream<'a>, CodecError> {
        let decoder: BoxDecoder = Box::new(YamlStreamDecoder::default());
        Ok(Pipeline::new(decoder, chunks))
    }
}

/// Writes each value as one document followed by `...`.
pub struct YamlStreamEncoder;

impl Transform for YamlStreamEncoder {
    type Input = Value;
    type Output = Vec<u8>;

    fn push(&mut self, input: Value, out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
        let mut doc = YamlCodec::encode_string(&input)?;
        if !doc.ends_with('\n') {
            doc.push('\n');
        }
        doc.push_str("...\n");
        out.push_back(doc.into_bytes());
        Ok(())
    }

    fn finish(&mut self, _out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
        Ok(())
    }
}

/// Splits a byte stream on document end markers.
#[derive(Default)]
pub struct YamlStreamDecoder {
    buf: Vec<u8>,
}

impl Transform for YamlStreamDecoder {
    type Input = Vec<u8>;
    type Output = Value;

    fn push(&mut self, input: Vec<u8>, out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        let rescan = self.buf.len().saturating_sub(DOCUMENT_END.len() - 1);
        self.buf.extend_from_slice(&input);
        let mut from = rescan;
        while let Some(i) = find(&self.buf[from..], DOCUMENT_END) {
            let end = from + i;
            let rest = self.buf.split_off(end + DOCUMENT_END.len());
            let mut doc = std::mem::replace(&mut self.buf, rest);
            doc.truncate(end + 1);
            out.push_back(decode_document(&doc)?);
            from = 0;
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        let rest = std::mem::take(&mut self.buf);
        let mut doc = rest.trim_ascii_end();
        if doc == b"..." {
            return Ok(());
        }
        if doc.ends_with(b"\n...") {
            doc = &doc[..doc.len() - 3];
        }
        if doc.trim_ascii().is_empty() {
            return Ok(());
        }
        out.push_back(decode_document(doc)?);
        Ok(())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
