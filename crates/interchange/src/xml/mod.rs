//! XML codec over the tagged-tree mapper.

mod mapper;
mod parser;
mod tree;

use std::collections::VecDeque;

pub use mapper::{decode_arbitrary, encode_arbitrary, from_document, to_document, ARBITRARY_NS};
pub use parser::{XmlError, XmlParser};
pub use tree::{Element, Node};

use crate::codec::{BoxDecoder, BoxEncoder, Codec};
use crate::error::CodecError;
use crate::hash::Digest;
use crate::stream::{Frame, Transform};
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct XmlCodec;

impl XmlCodec {
    pub fn new() -> Self {
        Self
    }

    /// Streaming encoder for dataset exports.
    pub fn entries_encoder(&self) -> EntriesEncoder {
        EntriesEncoder::default()
    }
}

impl Codec for XmlCodec {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn handles(&self) -> &'static [&'static str] {
        &["application/xml", "text/xml"]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["xml"]
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(to_document(value).to_xml().into_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let root = XmlParser::parse_bytes(bytes)?;
        Ok(from_document(&root)?)
    }

    fn print(&self, value: &Value) -> Result<String, CodecError> {
        Ok(to_document(value).to_xml_pretty("  "))
    }

    fn encoder(&self) -> Option<BoxEncoder> {
        Some(Box::new(XmlArrayEncoder::default()))
    }

    fn decoder(&self) -> Option<BoxDecoder> {
        Some(Box::new(XmlArrayDecoder::default()))
    }
}

/// Writes an `<array>` document, one encoded element per line.
#[derive(Default)]
pub struct XmlArrayEncoder {
    started: bool,
}

fn open_array(started: &mut bool, out: &mut VecDeque<Vec<u8>>) {
    if !*started {
        *started = true;
        out.push_back(format!("<array xmlns=\"{ARBITRARY_NS}\">\n").into_bytes());
    }
}

fn close_array(started: &mut bool, out: &mut VecDeque<Vec<u8>>) {
    open_array(started, out);
    out.push_back(b"</array>\n".to_vec());
}

impl Transform for XmlArrayEncoder {
    type Input = Value;
    type Output = Vec<u8>;

    fn push(&mut self, input: Value, out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
        open_array(&mut self.started, out);
        let mut line = encode_arbitrary(&input).to_xml();
        line.push('\n');
        out.push_back(line.into_bytes());
        Ok(())
    }

    fn finish(&mut self, out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
        close_array(&mut self.started, out);
        Ok(())
    }
}

/// Buffers a whole `<array>` document and emits its elements on finish.
#[derive(Default)]
pub struct XmlArrayDecoder {
    buf: Vec<u8>,
}

impl Transform for XmlArrayDecoder {
    type Input = Vec<u8>;
    type Output = Value;

    fn push(&mut self, input: Vec<u8>, _out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        self.buf.extend_from_slice(&input);
        Ok(())
    }

    fn finish(&mut self, out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        let root = XmlParser::parse_bytes(&std::mem::take(&mut self.buf))?;
        if root.tag != "array" || root.get_attr("xmlns") != Some(ARBITRARY_NS) {
            return Err(CodecError::RootType {
                found: "markup element",
            });
        }
        for child in root.elements() {
            out.push_back(decode_arbitrary(child)?);
        }
        Ok(())
    }
}

/// One record of a dataset export.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetEntry {
    pub id: String,
    pub hash: Digest,
    pub version: u64,
    pub value: Value,
}

impl Frame for DatasetEntry {}

/// Like [`XmlArrayEncoder`], with each element wrapped in an
/// `<entry id hash version>` record. Decoding unwraps the records.
#[derive(Default)]
pub struct EntriesEncoder {
    started: bool,
}

impl Transform for EntriesEncoder {
    type Input = DatasetEntry;
    type Output = Vec<u8>;

    fn push(&mut self, input: DatasetEntry, out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
        open_array(&mut self.started, out);
        let mut line = Element::new("entry")
            .attr("id", input.id)
            .attr("hash", hex::encode(input.hash))
            .attr("version", input.version.to_string())
            .child(encode_arbitrary(&input.value))
            .to_xml();
        line.push('\n');
        out.push_back(line.into_bytes());
        Ok(())
    }

    fn finish(&mut self, out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
        close_array(&mut self.started, out);
        Ok(())
    }
}
