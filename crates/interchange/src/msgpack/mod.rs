//! MessagePack codec.
//!
//! Bytes, non-finite floats and sets are native here. Every `{type, data}`
//! record is escaped before encoding, so any envelope found on decode was
//! written by the replacer. Streams are plain concatenations of values.

mod decoder;
mod encoder;
pub mod ext;
mod stream;

pub use decoder::MsgPackDecoder;
pub use encoder::MsgPackEncoder;
pub use stream::{MsgPackStreamDecoder, MsgPackStreamEncoder};

use interchange_buffers::BufferError;

use crate::codec::{BoxDecoder, BoxEncoder, ByteStream, ChunkIter, Codec, ValueIter, ValueStream};
use crate::error::CodecError;
use crate::protocol::Protocol;
use crate::stream::Pipeline;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MsgPackError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("invalid marker byte at offset {0}")]
    InvalidByte(usize),
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,
    #[error("unknown extension type {0}")]
    UnknownExtension(i8),
    #[error("malformed payload for extension type {0}")]
    MalformedExtension(i8),
    #[error("unexpected data after value at offset {0}")]
    TrailingData(usize),
    #[error("containers nested deeper than {max} levels at offset {0}", max = crate::value::MAX_DEPTH)]
    TooDeep(usize),
}

impl From<BufferError> for MsgPackError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::EndOfBuffer { .. } => MsgPackError::UnexpectedEnd,
            BufferError::InvalidUtf8 => MsgPackError::InvalidUtf8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl MsgPackCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for MsgPackCodec {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn handles(&self) -> &'static [&'static str] {
        &[
            "application/msgpack",
            "application/x-msgpack",
            "application/vnd.msgpack",
        ]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["msgpack"]
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        MsgPackEncoder::new().encode(value)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let raw = MsgPackDecoder::new(bytes).decode()?;
        Ok(Protocol::MSGPACK.revive(raw)?)
    }

    fn encoder(&self) -> Option<BoxEncoder> {
        Some(Box::new(MsgPackStreamEncoder::default()))
    }

    fn decoder(&self) -> Option<BoxDecoder> {
        Some(Box::new(MsgPackStreamDecoder::default()))
    }

    fn encode_iterable<'a>(&self, values: ValueIter<'a>) -> Result<ByteStream<'a>, CodecError> {
        let encoder: BoxEncoder = Box::new(MsgPackStreamEncoder::default());
        Ok(Pipeline::new(encoder, values))
    }

    fn decode_stream<'a>(&self, chunks: ChunkIter<'a>) -> Result<ValueStream<'a>, CodecError> {
        let decoder: BoxDecoder = Box::new(MsgPackStreamDecoder::default());
        Ok(Pipeline::new(decoder, chunks))
    }
}
