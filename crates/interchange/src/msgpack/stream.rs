//! Streaming MessagePack: values are written back to back with no framing,
//! and the decoder finds value boundaries from the markers themselves.

use std::collections::VecDeque;

use tracing::trace;

use super::{MsgPackDecoder, MsgPackEncoder, MsgPackError};
use crate::error::CodecError;
use crate::protocol::Protocol;
use crate::stream::Transform;
use crate::value::Value;

/// Writes each value as one MessagePack document.
#[derive(Default)]
pub struct MsgPackStreamEncoder {
    encoder: MsgPackEncoder,
}

impl Transform for MsgPackStreamEncoder {
    type Input = Value;
    type Output = Vec<u8>;

    fn push(&mut self, input: Value, out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
        out.push_back(self.encoder.encode(&input)?);
        Ok(())
    }

    fn finish(&mut self, _out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
        Ok(())
    }
}

/// Splits concatenated MessagePack documents arriving in arbitrary chunks.
///
/// Only the markers and length fields of a pending value are read as bytes
/// arrive; the value is decoded once its last byte is buffered.
pub struct MsgPackStreamDecoder {
    buf: Vec<u8>,
    /// End of the part of the pending value already walked.
    cursor: usize,
    /// Values still to walk before the pending value is complete.
    open: usize,
    limit: usize,
}

impl Default for MsgPackStreamDecoder {
    fn default() -> Self {
        Self::new(MsgPackStreamDecoder::DEFAULT_MAX_VALUE_BYTES)
    }
}

impl MsgPackStreamDecoder {
    pub const DEFAULT_MAX_VALUE_BYTES: usize = 32 * 1024 * 1024 + 64 * 1024;

    /// Decoder that rejects a single value larger than `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            cursor: 0,
            open: 0,
            limit,
        }
    }

    fn drain(&mut self, out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        loop {
            if self.open == 0 {
                if self.buf.is_empty() {
                    return Ok(());
                }
                self.open = 1;
            }
            let Some((end, children)) = item_extent(&self.buf, self.cursor) else {
                break;
            };
            if end > self.buf.len() {
                break;
            }
            self.cursor = end;
            self.open = self.open - 1 + children;
            if self.open == 0 {
                let raw = MsgPackDecoder::new(&self.buf[..end]).decode()?;
                self.buf.drain(..end);
                self.cursor = 0;
                trace!(bytes = end, "msgpack stream value complete");
                out.push_back(Protocol::MSGPACK.revive(raw)?);
            }
        }
        if self.buf.len() > self.limit {
            return Err(CodecError::PayloadTooLarge { limit: self.limit });
        }
        Ok(())
    }
}

impl Transform for MsgPackStreamDecoder {
    type Input = Vec<u8>;
    type Output = Value;

    fn push(&mut self, input: Vec<u8>, out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        self.buf.extend_from_slice(&input);
        self.drain(out)
    }

    fn finish(&mut self, out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        self.drain(out)?;
        if !self.buf.is_empty() {
            self.buf.clear();
            return Err(MsgPackError::UnexpectedEnd.into());
        }
        Ok(())
    }
}

/// Big-endian length field of `width` bytes at `at`.
fn length(data: &[u8], at: usize, width: usize) -> Option<usize> {
    let bytes = data.get(at..at + width)?;
    Some(bytes.iter().fold(0usize, |n, &b| (n << 8) | b as usize))
}

/// Where the item whose marker sits at `x` ends, not counting nested
/// values, and how many nested values follow it. `None` while the header
/// is incomplete. Reserved markers span one byte so that decoding reports
/// them.
fn item_extent(data: &[u8], x: usize) -> Option<(usize, usize)> {
    let marker = *data.get(x)?;
    let after = x + 1;
    Some(match marker {
        0x00..=0x7f | 0xe0..=0xff | 0xc0..=0xc3 => (after, 0),
        0x80..=0x8f => (after, 2 * (marker as usize & 0x0f)),
        0x90..=0x9f => (after, marker as usize & 0x0f),
        0xa0..=0xbf => (after + (marker as usize & 0x1f), 0),
        0xc4 | 0xd9 => (after + 1 + length(data, after, 1)?, 0),
        0xc5 | 0xda => (after + 2 + length(data, after, 2)?, 0),
        0xc6 | 0xdb => (after + 4 + length(data, after, 4)?, 0),
        0xc7 => (after + 2 + length(data, after, 1)?, 0),
        0xc8 => (after + 3 + length(data, after, 2)?, 0),
        0xc9 => (after + 5 + length(data, after, 4)?, 0),
        0xca | 0xce | 0xd2 => (after + 4, 0),
        0xcb | 0xcf | 0xd3 => (after + 8, 0),
        0xcc | 0xd0 => (after + 1, 0),
        0xcd | 0xd1 => (after + 2, 0),
        0xd4 => (after + 2, 0),
        0xd5 => (after + 3, 0),
        0xd6 => (after + 5, 0),
        0xd7 => (after + 9, 0),
        0xd8 => (after + 17, 0),
        0xdc => (after + 2, length(data, after, 2)?),
        0xdd => (after + 4, length(data, after, 4)?),
        0xde => (after + 2, 2 * length(data, after, 2)?),
        0xdf => (after + 4, 2 * length(data, after, 4)?),
    })
}
