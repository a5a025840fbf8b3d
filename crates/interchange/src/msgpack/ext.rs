//! MessagePack extension types.
//!
//! Application extensions get a stable id derived from their name, so the
//! wire value never depends on registration order. The registry is built
//! once, on first use.

use std::sync::LazyLock;

use chrono::DateTime;

use super::decoder::MsgPackDecoder;
use super::MsgPackError;
use crate::value::{Value, ValueSet};

/// The predefined timestamp extension.
pub const TIMESTAMP_EXT_ID: i8 = -1;

pub static EXTENSIONS: LazyLock<ExtensionRegistry> = LazyLock::new(ExtensionRegistry::new);

/// Decodes a payload found at the given container depth.
type DecodeFn = fn(&[u8], usize) -> Result<Value, MsgPackError>;

pub struct Extension {
    pub name: &'static str,
    pub id: i8,
    decode: DecodeFn,
}

pub struct ExtensionRegistry {
    extensions: Vec<Extension>,
}

/// Stable application extension id in `0..128` for `name`.
///
/// A djb2-style string hash: `state = state * 33 + byte`, from 5381.
pub fn extension_id(name: &str) -> i8 {
    let mut state: u32 = 5381;
    for b in name.bytes() {
        state = (state << 5).wrapping_add(state).wrapping_add(b as u32);
    }
    (state % 128) as i8
}

impl ExtensionRegistry {
    fn new() -> Self {
        Self {
            extensions: vec![
                Extension {
                    name: "set",
                    id: extension_id("set"),
                    decode: decode_set,
                },
                Extension {
                    name: "timestamp",
                    id: TIMESTAMP_EXT_ID,
                    decode: decode_timestamp,
                },
            ],
        }
    }

    pub fn set_id(&self) -> i8 {
        self.id_of("set").unwrap_or_else(|| extension_id("set"))
    }

    pub fn id_of(&self, name: &str) -> Option<i8> {
        self.extensions.iter().find(|e| e.name == name).map(|e| e.id)
    }

    pub fn by_id(&self, id: i8) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.id == id)
    }

    pub fn decode(&self, id: i8, payload: &[u8], depth: usize) -> Result<Value, MsgPackError> {
        match self.by_id(id) {
            Some(ext) => (ext.decode)(payload, depth),
            None => Err(MsgPackError::UnknownExtension(id)),
        }
    }
}

fn decode_set(payload: &[u8], depth: usize) -> Result<Value, MsgPackError> {
    let malformed = || MsgPackError::MalformedExtension(extension_id("set"));
    // A short payload is malformed, not truncated input.
    match MsgPackDecoder::nested(payload, depth).decode() {
        Ok(Value::List(members)) => Ok(Value::Set(members.into_iter().collect::<ValueSet>())),
        Ok(_) | Err(MsgPackError::UnexpectedEnd) => Err(malformed()),
        Err(err) => Err(err),
    }
}

fn decode_timestamp(payload: &[u8], _depth: usize) -> Result<Value, MsgPackError> {
    let malformed = || MsgPackError::MalformedExtension(TIMESTAMP_EXT_ID);
    let (secs, nanos) = match payload.len() {
        4 => {
            let secs = u32::from_be_bytes(payload.try_into().map_err(|_| malformed())?);
            (secs as i64, 0)
        }
        8 => {
            let raw = u64::from_be_bytes(payload.try_into().map_err(|_| malformed())?);
            ((raw & 0x3_ffff_ffff) as i64, (raw >> 34) as u32)
        }
        12 => {
            let nanos = u32::from_be_bytes(payload[..4].try_into().map_err(|_| malformed())?);
            let secs = i64::from_be_bytes(payload[4..].try_into().map_err(|_| malformed())?);
            (secs, nanos)
        }
        _ => return Err(malformed()),
    };
    DateTime::from_timestamp(secs, nanos)
        .map(Value::date)
        .ok_or_else(malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_id_is_stable() {
        assert_eq!(extension_id("set"), 17);
        assert_eq!(EXTENSIONS.set_id(), 17);
    }

    #[test]
    fn unknown_extension() {
        assert_eq!(
            EXTENSIONS.decode(99, &[], 0),
            Err(MsgPackError::UnknownExtension(99))
        );
    }

    #[test]
    fn timestamp32() {
        let v = EXTENSIONS.decode(TIMESTAMP_EXT_ID, &1_000u32.to_be_bytes(), 0).unwrap();
        assert_eq!(v, Value::date_millis(1_000_000).unwrap());
    }

    #[test]
    fn set_payload_counts_toward_depth() {
        // [null] as a set payload, decoded at the outer limit.
        let payload = [0x91, 0xc0];
        let set_id = EXTENSIONS.set_id();
        assert!(EXTENSIONS.decode(set_id, &payload, 0).is_ok());
        assert!(matches!(
            EXTENSIONS.decode(set_id, &payload, crate::value::MAX_DEPTH),
            Err(MsgPackError::TooDeep(_))
        ));
        assert_eq!(
            EXTENSIONS.decode(set_id, &[0x92, 0xc0], 0),
            Err(MsgPackError::MalformedExtension(set_id))
        );
    }
}
