//! interchange: a multi-format data-interchange engine.
//!
//! Every codec transcodes the same [`Value`] model. Types a format cannot
//! carry natively travel in `{type, data}` envelopes defined by
//! [`Protocol`], so `decode(encode(v)) == v` holds for every codec.
//!
//! - [`json`], [`jsonl`], [`yaml`], [`msgpack`], [`xml`]: registered wire
//!   formats, resolved by media type or file name through [`CodecRegistry`].
//! - [`native`]: trusted binary format for scratch storage and hashing.
//! - [`stream`]: the incremental [`Transform`] contract with synchronous
//!   ([`Pipeline`]) and async ([`duplex`]) drivers.
//! - [`hash`]: order-insensitive content hashing.
//! - [`scratch`], [`ingest`]: temporary storage and attachment ingestion.

pub mod codec;
pub mod error;
pub mod hash;
pub mod ingest;
pub mod json;
pub mod jsonl;
pub mod msgpack;
pub mod native;
pub mod protocol;
pub mod registry;
pub mod scratch;
pub mod stream;
pub mod value;
pub mod xml;
pub mod yaml;

pub use codec::{decoder_duplex, encoder_duplex, BoxDecoder, BoxEncoder, Codec};
pub use error::{CodecError, DecodeError, EnvelopeError};
pub use hash::{content_hash, hash_value, ContentHasher, Digest};
pub use ingest::{ingest, IngestedAttachment};
pub use json::{JsonCodec, JsonDecoderOptions};
pub use jsonl::JsonLinesCodec;
pub use msgpack::MsgPackCodec;
pub use native::NativeCodec;
pub use protocol::Protocol;
pub use registry::CodecRegistry;
pub use scratch::{ScratchEntry, ScratchOptions, ScratchStore};
pub use stream::{duplex, DuplexOptions, DuplexReader, DuplexWriter, Frame, Pipeline, Transform};
pub use value::{Attachment, AttachmentRef, BigInteger, Object, Value, ValueMap, ValueSet, MAX_DEPTH};
pub use xml::{DatasetEntry, XmlCodec};
pub use yaml::YamlCodec;
