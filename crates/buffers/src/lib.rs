//! interchange-buffers: byte-level primitives for the interchange codecs.
//!
//! - [`Writer`]: auto-growing output buffer with big-endian helpers.
//! - [`Reader`]: bounds-checked cursor over a borrowed byte slice.
//! - [`StreamingOctetReader`]: reader over a queue of pushed chunks, for
//!   decoders that receive their input piecewise.

mod reader;
mod streaming_octet_reader;
mod writer;

pub use reader::Reader;
pub use streaming_octet_reader::StreamingOctetReader;
pub use writer::Writer;

/// Errors raised by the readers when the input is exhausted or malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("unexpected end of buffer: needed {needed} bytes, {available} available")]
    EndOfBuffer { needed: usize, available: usize },
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
}
