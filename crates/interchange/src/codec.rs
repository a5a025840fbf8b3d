//! The uniform codec interface.

use crate::error::CodecError;
use crate::stream::{duplex, DuplexOptions, DuplexReader, DuplexWriter, Pipeline, Transform};
use crate::value::Value;

/// Boxed incremental encoder: values in, byte chunks out.
pub type BoxEncoder = Box<dyn Transform<Input = Value, Output = Vec<u8>> + Send>;

/// Boxed incremental decoder: byte chunks in, values out.
pub type BoxDecoder = Box<dyn Transform<Input = Vec<u8>, Output = Value> + Send>;

pub type ValueIter<'a> = Box<dyn Iterator<Item = Value> + Send + 'a>;
pub type ChunkIter<'a> = Box<dyn Iterator<Item = Vec<u8>> + Send + 'a>;

/// Byte chunks produced by [`Codec::encode_iterable`].
pub type ByteStream<'a> = Pipeline<BoxEncoder, ValueIter<'a>>;

/// Values produced by [`Codec::decode_stream`].
pub type ValueStream<'a> = Pipeline<BoxDecoder, ChunkIter<'a>>;

/// A wire format the engine can read and write.
///
/// `encode` and `decode` are the whole-document operations every codec has.
/// Streaming capabilities are optional: a codec returns `None` (or
/// [`CodecError::UnsupportedOperation`]) for what it cannot do.
pub trait Codec: Send + Sync {
    /// Stable short name, e.g. `"json"`.
    fn name(&self) -> &'static str;

    /// Media types this codec answers to, lowercase.
    fn handles(&self) -> &'static [&'static str] {
        &[]
    }

    /// File extensions without the leading dot, lowercase.
    fn extensions(&self) -> &'static [&'static str] {
        &[]
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;

    /// Human-readable rendering.
    fn print(&self, _value: &Value) -> Result<String, CodecError> {
        Err(CodecError::unsupported(self.name(), "print"))
    }

    /// Incremental encoder framing a sequence of values as one document.
    fn encoder(&self) -> Option<BoxEncoder> {
        None
    }

    /// Incremental decoder for a document arriving in chunks.
    fn decoder(&self) -> Option<BoxDecoder> {
        None
    }

    /// Encodes a lazily produced sequence of values as a stream of frames.
    fn encode_iterable<'a>(&self, _values: ValueIter<'a>) -> Result<ByteStream<'a>, CodecError> {
        Err(CodecError::unsupported(self.name(), "encode_iterable"))
    }

    /// Decodes a sequence of frames arriving as byte chunks.
    fn decode_stream<'a>(&self, _chunks: ChunkIter<'a>) -> Result<ValueStream<'a>, CodecError> {
        Err(CodecError::unsupported(self.name(), "decode_stream"))
    }
}

/// Async writer/reader pair around `codec`'s streaming encoder.
pub fn encoder_duplex<C: Codec + ?Sized>(
    codec: &C,
    options: DuplexOptions,
) -> Result<(DuplexWriter<Value>, DuplexReader<BoxEncoder>), CodecError> {
    let encoder = codec
        .encoder()
        .ok_or_else(|| CodecError::unsupported(codec.name(), "encoder"))?;
    Ok(duplex(encoder, options))
}

/// Async writer/reader pair around `codec`'s streaming decoder.
pub fn decoder_duplex<C: Codec + ?Sized>(
    codec: &C,
    options: DuplexOptions,
) -> Result<(DuplexWriter<Vec<u8>>, DuplexReader<BoxDecoder>), CodecError> {
    let decoder = codec
        .decoder()
        .ok_or_else(|| CodecError::unsupported(codec.name(), "decoder"))?;
    Ok(duplex(decoder, options))
}
