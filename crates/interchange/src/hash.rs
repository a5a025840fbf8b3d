//! Content hashing.
//!
//! Values hash over their canonical native encoding, so deep-equal values
//! hash the same regardless of key, entry or member order.

use sha2::{Digest as _, Sha256};

use crate::native::NativeEncoder;
use crate::value::Value;

/// SHA-256 output.
pub type Digest = [u8; 32];

/// Deterministic, order-insensitive encoding of `value`.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    NativeEncoder::canonical().encode(value)
}

pub fn hash_value(value: &Value) -> Digest {
    content_hash(&canonical_bytes(value))
}

/// SHA-256 of a raw payload.
pub fn content_hash(data: &[u8]) -> Digest {
    Sha256::digest(data).into()
}

/// Incremental [`content_hash`] for payloads that arrive in pieces.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
    size: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.size += chunk.len() as u64;
        self.inner.update(chunk);
    }

    /// Bytes fed so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn finalize(self) -> Digest {
        self.inner.finalize().into()
    }
}
