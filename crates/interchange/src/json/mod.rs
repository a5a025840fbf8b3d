//! JSON codec.

mod decoder;
mod encoder;
mod stream;
mod tokenizer;

use tracing::warn;

pub use decoder::JsonDecoder;
pub use encoder::JsonEncoder;
pub use stream::{JsonArrayEncoder, JsonObjectEncoder, JsonStreamDecoder};
pub use tokenizer::{Token, Tokenizer};

pub(crate) use encoder::format_number;

use crate::codec::{BoxDecoder, BoxEncoder, ByteStream, ChunkIter, Codec, ValueIter, ValueStream};
use crate::error::CodecError;
use crate::protocol::Protocol;
use crate::stream::Pipeline;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JsonError {
    #[error("invalid JSON at byte {0}")]
    Invalid(usize),
    #[error("invalid string literal at byte {0}")]
    InvalidString(usize),
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected data after document at byte {0}")]
    TrailingData(usize),
    #[error("invalid UTF-8")]
    InvalidUtf8,
    #[error("containers nested deeper than {max} levels at byte {0}", max = crate::value::MAX_DEPTH)]
    TooDeep(usize),
}

/// Limits for the streaming decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonDecoderOptions {
    /// Largest single top-level element the streaming decoder buffers.
    pub max_value_bytes: usize,
}

impl JsonDecoderOptions {
    pub const DEFAULT_MAX_VALUE_BYTES: usize = 32 * 1024 * 1024 + 64 * 1024;
}

impl Default for JsonDecoderOptions {
    fn default() -> Self {
        Self {
            max_value_bytes: Self::DEFAULT_MAX_VALUE_BYTES,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JsonCodec {
    options: JsonDecoderOptions,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: JsonDecoderOptions) -> Self {
        Self { options }
    }

    /// Streaming encoder that frames `[key, value]` pairs as one object.
    pub fn object_encoder(&self) -> BoxEncoder {
        Box::new(JsonObjectEncoder::new())
    }

    /// Parses `bytes`, retrying in lenient mode when strict parsing fails.
    pub fn parse(bytes: &[u8]) -> Result<Value, JsonError> {
        match JsonDecoder::new(bytes).decode() {
            Ok(value) => Ok(value),
            Err(strict) => match JsonDecoder::lenient(bytes).decode() {
                Ok(value) => {
                    warn!(error = %strict, "input is not strict JSON, parsed leniently");
                    Ok(value)
                }
                Err(_) => Err(strict),
            },
        }
    }
}

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn handles(&self) -> &'static [&'static str] {
        &["application/json", "text/json"]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        JsonEncoder::new().encode(value)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let raw = Self::parse(bytes)?;
        Ok(Protocol::JSON.revive(raw)?)
    }

    fn print(&self, value: &Value) -> Result<String, CodecError> {
        let bytes = JsonEncoder::pretty(2).encode(value)?;
        String::from_utf8(bytes).map_err(|_| JsonError::InvalidUtf8.into())
    }

    fn encoder(&self) -> Option<BoxEncoder> {
        Some(Box::new(JsonArrayEncoder::new()))
    }

    fn decoder(&self) -> Option<BoxDecoder> {
        Some(Box::new(JsonStreamDecoder::new(self.options)))
    }

    fn encode_iterable<'a>(&self, values: ValueIter<'a>) -> Result<ByteStream<'a>, CodecError> {
        let encoder: BoxEncoder = Box::new(JsonArrayEncoder::new());
        Ok(Pipeline::new(encoder, values))
    }

    fn decode_stream<'a>(&self, chunks: ChunkIter<'a>) -> Result<ValueStream<'a>, CodecError> {
        let decoder: BoxDecoder = Box::new(JsonStreamDecoder::new(self.options));
        Ok(Pipeline::new(decoder, chunks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_falls_back_to_lenient() {
        let codec = JsonCodec::new();
        let v = codec.decode(b"{\"a\": 1, // one\n}").unwrap();
        assert_eq!(v, Value::object([("a", 1)]));
    }

    #[test]
    fn decode_reports_strict_error_when_both_fail() {
        let err = JsonCodec::parse(b"[1, 2").unwrap_err();
        assert_eq!(err, JsonError::UnexpectedEnd);
    }

    #[test]
    fn print_indents_two_spaces() {
        let codec = JsonCodec::new();
        assert_eq!(codec.print(&Value::list([1])).unwrap(), "[\n  1\n]");
    }

    #[test]
    fn print_then_decode_is_identity() {
        let codec = JsonCodec::new();
        let v = Value::object([
            ("list", Value::list([Value::Undefined, Value::Number(f64::INFINITY)])),
            ("set", Value::set(["a", "b"])),
        ]);
        let printed = codec.print(&v).unwrap();
        assert_eq!(codec.decode(printed.as_bytes()).unwrap(), v);
    }

    #[test]
    fn default_limit() {
        assert_eq!(JsonDecoderOptions::default().max_value_bytes, 33_619_968);
    }
}
