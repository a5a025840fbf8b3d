//! Streaming octet reader for reading across chunk boundaries.

use std::collections::VecDeque;

use crate::BufferError;

/// A streaming reader that manages multiple chunks of bytes.
///
/// It does not merge chunks into a single buffer; it tracks chunks and reads
/// across boundaries as needed. Callers check [`size`](Self::size) before a
/// read and wait for more chunks when a frame is incomplete.
pub struct StreamingOctetReader {
    chunks: VecDeque<Vec<u8>>,
    /// Current position within the front chunk.
    x: usize,
    /// Total size of all queued chunks, including consumed bytes of the front one.
    chunk_size: usize,
}

impl Default for StreamingOctetReader {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingOctetReader {
    pub fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
            x: 0,
            chunk_size: 0,
        }
    }

    /// Returns the number of bytes remaining to be read.
    pub fn size(&self) -> usize {
        self.chunk_size - self.x
    }

    /// Adds a chunk of data to be read.
    pub fn push(&mut self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        self.chunk_size += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// Drops all buffered bytes.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.x = 0;
        self.chunk_size = 0;
    }

    fn assert_size(&self, size: usize) -> Result<(), BufferError> {
        if size > self.size() {
            return Err(BufferError::EndOfBuffer {
                needed: size,
                available: self.size(),
            });
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8, BufferError> {
        self.assert_size(1)?;
        let octet = self.chunks[0][self.x];
        self.skip_unchecked(1);
        Ok(octet)
    }

    /// Reads an unsigned 32-bit integer (big-endian).
    pub fn u32(&mut self) -> Result<u32, BufferError> {
        self.assert_size(4)?;
        let mut bytes = [0u8; 4];
        self.copy_to(&mut bytes);
        Ok(u32::from_be_bytes(bytes))
    }

    /// Reads bytes into a new vector.
    pub fn buf(&mut self, size: usize) -> Result<Vec<u8>, BufferError> {
        self.assert_size(size)?;
        let mut result = vec![0u8; size];
        self.copy_to(&mut result);
        Ok(result)
    }

    fn copy_to(&mut self, dst: &mut [u8]) {
        let mut dst_pos = 0;
        let mut chunk_idx = 0;
        let mut local_x = self.x;
        while dst_pos < dst.len() {
            let chunk = &self.chunks[chunk_idx];
            let available = chunk.len() - local_x;
            let to_copy = available.min(dst.len() - dst_pos);
            dst[dst_pos..dst_pos + to_copy].copy_from_slice(&chunk[local_x..local_x + to_copy]);
            dst_pos += to_copy;
            chunk_idx += 1;
            local_x = 0;
        }
        self.skip_unchecked(dst.len());
    }

    fn skip_unchecked(&mut self, mut n: usize) {
        while n > 0 {
            let Some(chunk) = self.chunks.front() else {
                return;
            };
            let remaining = chunk.len() - self.x;
            if remaining > n {
                self.x += n;
                return;
            }
            n -= remaining;
            self.chunk_size -= chunk.len();
            self.chunks.pop_front();
            self.x = 0;
        }
    }
}
