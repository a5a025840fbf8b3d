//! JSON Lines: one JSON document per line.
//!
//! A whole-document encode of a list writes one line per element; an object
//! or map writes one `[key, value]` line per entry, so decoding yields the
//! entries rather than the original object.

use std::collections::VecDeque;

use tracing::trace;

use crate::codec::{BoxDecoder, BoxEncoder, ByteStream, ChunkIter, Codec, ValueIter, ValueStream};
use crate::error::CodecError;
use crate::json::{JsonCodec, JsonEncoder};
use crate::protocol::Protocol;
use crate::stream::{Pipeline, Transform};
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesCodec;

impl JsonLinesCodec {
    pub fn new() -> Self {
        Self
    }
}

fn decode_line(line: &[u8]) -> Result<Option<Value>, CodecError> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(None);
    }
    let raw = JsonCodec::parse(line)?;
    Ok(Some(Protocol::JSON.revive(raw)?))
}

impl Codec for JsonLinesCodec {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn handles(&self) -> &'static [&'static str] {
        &[
            "application/jsonl",
            "application/x-ndjson",
            "application/jsonlines",
            "application/x-jsonlines",
        ]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["jsonl", "ndjson"]
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let lines: Vec<Value> = match value {
            Value::List(items) => items.clone(),
            Value::Set(set) => set.iter().cloned().collect(),
            Value::Object(obj) => obj
                .iter()
                .map(|(k, v)| Value::List(vec![Value::String(k.clone()), v.clone()]))
                .collect(),
            Value::Map(map) => map
                .iter()
                .map(|(k, v)| Value::List(vec![k.clone(), v.clone()]))
                .collect(),
            other => vec![other.clone()],
        };
        let mut encoder = JsonLinesEncoder::default();
        let mut out = VecDeque::new();
        for line in lines {
            encoder.push(line, &mut out)?;
        }
        Ok(out.into_iter().flatten().collect())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let mut values = Vec::new();
        for line in bytes.split(|&b| b == b'\n') {
            if let Some(v) = decode_line(line)? {
                values.push(v);
            }
        }
        Ok(Value::List(values))
    }

    fn encoder(&self) -> Option<BoxEncoder> {
        Some(Box::new(JsonLinesEncoder::default()))
    }

    fn decoder(&self) -> Option<BoxDecoder> {
        Some(Box::new(JsonLinesDecoder::default()))
    }

    fn encode_iterable<'a>(&self, values: ValueIter<'a>) -> Result<ByteStream<'a>, CodecError> {
        let encoder: BoxEncoder = Box::new(JsonLinesEncoder::default());
        Ok(Pipeline::new(encoder, values))
    }

    fn decode_stream<'a>(&self, chunks: ChunkIter<'a>) -> Result<ValueStream<'a>, CodecError> {
        let decoder: BoxDecoder = Box::new(JsonLinesDecoder::default());
        Ok(Pipeline::new(decoder, chunks))
    }
}

/// Writes each value as one compact line.
#[derive(Default)]
pub struct JsonLinesEncoder {
    encoder: JsonEncoder,
}

impl Transform for JsonLinesEncoder {
    type Input = Value;
    type Output = Vec<u8>;

    fn push(&mut self, input: Value, out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
        let mut line = self.encoder.encode(&input)?;
        line.push(b'\n');
        out.push_back(line);
        Ok(())
    }

    fn finish(&mut self, _out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
        Ok(())
    }
}

/// Buffers chunks and decodes each complete line.
#[derive(Default)]
pub struct JsonLinesDecoder {
    buf: Vec<u8>,
    lines: usize,
}

impl JsonLinesDecoder {
    fn emit(&mut self, line: &[u8], out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        self.lines += 1;
        if let Some(v) = decode_line(line)? {
            trace!(line = self.lines, "jsonl line decoded");
            out.push_back(v);
        }
        Ok(())
    }
}

impl Transform for JsonLinesDecoder {
    type Input = Vec<u8>;
    type Output = Value;

    fn push(&mut self, input: Vec<u8>, out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        let scan_from = self.buf.len();
        self.buf.extend_from_slice(&input);
        let Some(last_newline) = self.buf[scan_from..]
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|i| scan_from + i)
        else {
            return Ok(());
        };
        let rest = self.buf.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buf, rest);
        for line in complete.split(|&b| b == b'\n') {
            self.emit(line, out)?;
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        let rest = std::mem::take(&mut self.buf);
        self.emit(&rest, out)
    }
}
