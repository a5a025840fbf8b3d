//! Native binary codec.
//!
//! A compact tag-byte format that carries every [`Value`] variant directly,
//! with no envelopes. It trusts its input and is meant for bytes this
//! process wrote itself (scratch storage, hashing), so it registers no
//! media types or file extensions.
//!
//! Layout: a `0xFF 0x01` header, then one tagged value. Lengths and counts
//! are `u32` big-endian. Streams are a sequence of `u32` length-prefixed
//! documents.

use std::collections::VecDeque;

use interchange_buffers::{BufferError, Reader, StreamingOctetReader, Writer};
use url::Url;

use crate::codec::{BoxDecoder, BoxEncoder, ByteStream, ChunkIter, Codec, ValueIter, ValueStream};
use crate::error::CodecError;
use crate::hash::Digest;
use crate::stream::{Pipeline, Transform};
use crate::value::{Attachment, AttachmentRef, Object, Value, ValueMap, ValueSet, MAX_DEPTH};

const MAGIC: u8 = 0xff;
const VERSION: u8 = 0x01;

mod tag {
    pub const NULL: u8 = 0x00;
    pub const UNDEFINED: u8 = 0x01;
    pub const FALSE: u8 = 0x02;
    pub const TRUE: u8 = 0x03;
    pub const NUMBER: u8 = 0x04;
    pub const BIG_INTEGER: u8 = 0x05;
    pub const STRING: u8 = 0x06;
    pub const BYTES: u8 = 0x07;
    pub const LIST: u8 = 0x08;
    pub const OBJECT: u8 = 0x09;
    pub const MAP: u8 = 0x0a;
    pub const SET: u8 = 0x0b;
    pub const DATE: u8 = 0x0c;
    pub const URL: u8 = 0x0d;
    pub const ATTACHMENT_REF: u8 = 0x0e;
    pub const ATTACHMENT: u8 = 0x0f;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NativeError {
    #[error("missing or unsupported header")]
    Header,
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unknown tag byte 0x{tag:02x} at offset {at}")]
    UnknownTag { tag: u8, at: usize },
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,
    #[error("invalid {0} payload")]
    InvalidPayload(&'static str),
    #[error("unexpected data after value at offset {0}")]
    TrailingData(usize),
    #[error("containers nested deeper than {MAX_DEPTH} levels at offset {0}")]
    TooDeep(usize),
}

impl From<BufferError> for NativeError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::EndOfBuffer { .. } => NativeError::UnexpectedEnd,
            BufferError::InvalidUtf8 => NativeError::InvalidUtf8,
        }
    }
}

/// Writes values in the native layout.
///
/// In canonical mode object keys, map entries and set members are written
/// in sorted order and `-0` is written as `0`, so deep-equal values produce
/// identical bytes.
pub struct NativeEncoder {
    pub writer: Writer,
    canonical: bool,
}

impl Default for NativeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEncoder {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(),
            canonical: false,
        }
    }

    pub fn canonical() -> Self {
        Self {
            writer: Writer::new(),
            canonical: true,
        }
    }

    pub fn encode(&mut self, value: &Value) -> Vec<u8> {
        self.writer.reset();
        self.writer.u8(MAGIC);
        self.writer.u8(VERSION);
        self.write_any(value);
        self.writer.flush()
    }

    /// Body bytes of one value, without the header.
    fn body(&self, value: &Value) -> Vec<u8> {
        let mut inner = NativeEncoder {
            writer: Writer::with_alloc_size(64),
            canonical: self.canonical,
        };
        inner.write_any(value);
        inner.writer.flush()
    }

    pub fn write_any(&mut self, value: &Value) {
        match value {
            Value::Null => self.writer.u8(tag::NULL),
            Value::Undefined => self.writer.u8(tag::UNDEFINED),
            Value::Bool(false) => self.writer.u8(tag::FALSE),
            Value::Bool(true) => self.writer.u8(tag::TRUE),
            Value::Number(n) => {
                let n = if self.canonical && *n == 0.0 { 0.0 } else { *n };
                let n = if self.canonical && n.is_nan() { f64::NAN } else { n };
                self.writer.u8f64(tag::NUMBER, n);
            }
            Value::BigInteger(n) => {
                self.writer.u8(tag::BIG_INTEGER);
                self.write_str(&n.to_string());
            }
            Value::String(s) => {
                self.writer.u8(tag::STRING);
                self.write_str(s);
            }
            Value::Bytes(b) => {
                self.writer.u8(tag::BYTES);
                self.write_bin(b);
            }
            Value::List(items) => {
                self.writer.u8u32(tag::LIST, items.len() as u32);
                for item in items {
                    self.write_any(item);
                }
            }
            Value::Object(obj) => self.write_obj(obj),
            Value::Map(map) => self.write_map(map),
            Value::Set(set) => self.write_set(set),
            Value::Date(at) => {
                self.writer.u8(tag::DATE);
                self.writer.i64(at.timestamp_millis());
            }
            Value::Url(url) => {
                self.writer.u8(tag::URL);
                self.write_str(url.as_str());
            }
            Value::AttachmentRef(r) => {
                self.writer.u8(tag::ATTACHMENT_REF);
                self.write_ref(r);
            }
            Value::Attachment(a) => {
                self.writer.u8(tag::ATTACHMENT);
                self.write_ref(&a.reference);
                self.write_bin(&a.data);
            }
        }
    }

    fn write_str(&mut self, s: &str) {
        self.writer.u32(s.len() as u32);
        self.writer.utf8(s);
    }

    fn write_bin(&mut self, b: &[u8]) {
        self.writer.u32(b.len() as u32);
        self.writer.buf(b);
    }

    fn write_ref(&mut self, r: &AttachmentRef) {
        self.writer.buf(&r.hash);
        self.write_str(&r.mime_type);
    }

    fn write_obj(&mut self, obj: &Object) {
        self.writer.u8u32(tag::OBJECT, obj.len() as u32);
        let mut entries: Vec<(&String, &Value)> = obj.iter().collect();
        if self.canonical {
            entries.sort_by(|a, b| a.0.cmp(b.0));
        }
        for (k, v) in entries {
            self.write_str(k);
            self.write_any(v);
        }
    }

    fn write_map(&mut self, map: &ValueMap) {
        self.writer.u8u32(tag::MAP, map.len() as u32);
        if !self.canonical {
            for (k, v) in map.iter() {
                self.write_any(k);
                self.write_any(v);
            }
            return;
        }
        let mut entries: Vec<(Vec<u8>, Vec<u8>)> = map
            .iter()
            .map(|(k, v)| (self.body(k), self.body(v)))
            .collect();
        entries.sort();
        for (k, v) in entries {
            self.writer.buf(&k);
            self.writer.buf(&v);
        }
    }

    fn write_set(&mut self, set: &ValueSet) {
        self.writer.u8u32(tag::SET, set.len() as u32);
        if !self.canonical {
            for member in set {
                self.write_any(member);
            }
            return;
        }
        let mut members: Vec<Vec<u8>> = set.iter().map(|m| self.body(m)).collect();
        members.sort();
        for m in members {
            self.writer.buf(&m);
        }
    }
}

pub struct NativeDecoder<'a> {
    reader: Reader<'a>,
    depth: usize,
}

impl<'a> NativeDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: Reader::new(data),
            depth: 0,
        }
    }

    pub fn decode(mut self) -> Result<Value, NativeError> {
        if self.reader.u8().ok() != Some(MAGIC) || self.reader.u8().ok() != Some(VERSION) {
            return Err(NativeError::Header);
        }
        let value = self.read_any()?;
        if self.reader.size() > 0 {
            return Err(NativeError::TrailingData(self.reader.x));
        }
        Ok(value)
    }

    fn read_any(&mut self) -> Result<Value, NativeError> {
        let at = self.reader.x;
        let t = self.reader.u8()?;
        let container = matches!(t, tag::LIST | tag::OBJECT | tag::MAP | tag::SET);
        if container {
            if self.depth >= MAX_DEPTH {
                return Err(NativeError::TooDeep(at));
            }
            self.depth += 1;
        }
        let value = match t {
            tag::NULL => Value::Null,
            tag::UNDEFINED => Value::Undefined,
            tag::FALSE => Value::Bool(false),
            tag::TRUE => Value::Bool(true),
            tag::NUMBER => Value::Number(self.reader.f64()?),
            tag::BIG_INTEGER => {
                let digits = self.read_str()?;
                Value::BigInteger(
                    digits
                        .parse()
                        .map_err(|_| NativeError::InvalidPayload("bigint"))?,
                )
            }
            tag::STRING => Value::String(self.read_str()?.to_owned()),
            tag::BYTES => Value::Bytes(self.read_bin()?.to_vec()),
            tag::LIST => {
                let n = self.read_len()?;
                let mut items = Vec::with_capacity(n.min(self.reader.size()));
                for _ in 0..n {
                    items.push(self.read_any()?);
                }
                Value::List(items)
            }
            tag::OBJECT => {
                let n = self.read_len()?;
                let mut obj = Object::with_capacity(n.min(self.reader.size()));
                for _ in 0..n {
                    let key = self.read_str()?.to_owned();
                    obj.insert(key, self.read_any()?);
                }
                Value::Object(obj)
            }
            tag::MAP => {
                let n = self.read_len()?;
                let mut map = ValueMap::new();
                for _ in 0..n {
                    let k = self.read_any()?;
                    map.insert(k, self.read_any()?);
                }
                Value::Map(map)
            }
            tag::SET => {
                let n = self.read_len()?;
                let mut set = ValueSet::new();
                for _ in 0..n {
                    set.insert(self.read_any()?);
                }
                Value::Set(set)
            }
            tag::DATE => {
                let ms = self.reader.i64()?;
                Value::date_millis(ms).ok_or(NativeError::InvalidPayload("date"))?
            }
            tag::URL => {
                let s = self.read_str()?;
                Value::Url(Url::parse(s).map_err(|_| NativeError::InvalidPayload("url"))?)
            }
            tag::ATTACHMENT_REF => Value::AttachmentRef(self.read_ref()?),
            tag::ATTACHMENT => {
                let reference = self.read_ref()?;
                let data = self.read_bin()?.to_vec();
                Value::Attachment(Attachment { reference, data })
            }
            _ => return Err(NativeError::UnknownTag { tag: t, at }),
        };
        if container {
            self.depth -= 1;
        }
        Ok(value)
    }

    fn read_len(&mut self) -> Result<usize, NativeError> {
        Ok(self.reader.u32()? as usize)
    }

    fn read_str(&mut self) -> Result<&'a str, NativeError> {
        let n = self.read_len()?;
        Ok(self.reader.utf8(n)?)
    }

    fn read_bin(&mut self) -> Result<&'a [u8], NativeError> {
        let n = self.read_len()?;
        Ok(self.reader.buf(n)?)
    }

    fn read_ref(&mut self) -> Result<AttachmentRef, NativeError> {
        let hash: Digest = self
            .reader
            .buf(32)?
            .try_into()
            .map_err(|_| NativeError::InvalidPayload("attachment hash"))?;
        let mime = self.read_str()?;
        Ok(AttachmentRef::new(hash, mime))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCodec;

impl NativeCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for NativeCodec {
    fn name(&self) -> &'static str {
        "native"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(NativeEncoder::new().encode(value))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        Ok(NativeDecoder::new(bytes).decode()?)
    }

    fn encoder(&self) -> Option<BoxEncoder> {
        Some(Box::new(NativeStreamEncoder::default()))
    }

    fn decoder(&self) -> Option<BoxDecoder> {
        Some(Box::new(NativeStreamDecoder::default()))
    }

    fn encode_iterable<'a>(&self, values: ValueIter<'a>) -> Result<ByteStream<'a>, CodecError> {
        let encoder: BoxEncoder = Box::new(NativeStreamEncoder::default());
        Ok(Pipeline::new(encoder, values))
    }

    fn decode_stream<'a>(&self, chunks: ChunkIter<'a>) -> Result<ValueStream<'a>, CodecError> {
        let decoder: BoxDecoder = Box::new(NativeStreamDecoder::default());
        Ok(Pipeline::new(decoder, chunks))
    }
}

/// Writes each value as a length-prefixed document.
#[derive(Default)]
pub struct NativeStreamEncoder {
    encoder: NativeEncoder,
}

impl Transform for NativeStreamEncoder {
    type Input = Value;
    type Output = Vec<u8>;

    fn push(&mut self, input: Value, out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
        let doc = self.encoder.encode(&input);
        let mut frame = Vec::with_capacity(4 + doc.len());
        frame.extend_from_slice(&(doc.len() as u32).to_be_bytes());
        frame.extend_from_slice(&doc);
        out.push_back(frame);
        Ok(())
    }

    fn finish(&mut self, _out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
        Ok(())
    }
}

/// Reassembles length-prefixed documents from arbitrary chunks.
#[derive(Default)]
pub struct NativeStreamDecoder {
    reader: StreamingOctetReader,
    frame_len: Option<usize>,
}

impl Transform for NativeStreamDecoder {
    type Input = Vec<u8>;
    type Output = Value;

    fn push(&mut self, input: Vec<u8>, out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        self.reader.push(input);
        loop {
            let len = match self.frame_len {
                Some(len) => len,
                None if self.reader.size() >= 4 => {
                    let len = self.reader.u32().map_err(NativeError::from)? as usize;
                    self.frame_len = Some(len);
                    len
                }
                None => return Ok(()),
            };
            if self.reader.size() < len {
                return Ok(());
            }
            let doc = self.reader.buf(len).map_err(NativeError::from)?;
            self.frame_len = None;
            out.push_back(NativeDecoder::new(&doc).decode()?);
        }
    }

    fn finish(&mut self, _out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        if self.frame_len.is_some() || self.reader.size() > 0 {
            self.reader.clear();
            return Err(NativeError::UnexpectedEnd.into());
        }
        Ok(())
    }
}
