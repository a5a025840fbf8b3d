//! `MsgPackEncoder`: MessagePack writer for replaced values.

use interchange_buffers::Writer;

use super::ext::EXTENSIONS;
use crate::error::CodecError;
use crate::protocol::Protocol;
use crate::value::{Object, Value, ValueSet};

/// Largest integer magnitude written with an integer marker; beyond it
/// numbers are written as float64 so they decode to the same `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub struct MsgPackEncoder {
    pub writer: Writer,
}

impl Default for MsgPackEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MsgPackEncoder {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(),
        }
    }

    fn with_alloc_size(size: usize) -> Self {
        Self {
            writer: Writer::with_alloc_size(size),
        }
    }

    pub fn encode(&mut self, value: &Value) -> Result<Vec<u8>, CodecError> {
        self.writer.reset();
        let replaced = Protocol::MSGPACK.replace(value);
        if let Err(err) = self.write_any(&replaced) {
            self.writer.reset();
            return Err(err);
        }
        Ok(self.writer.flush())
    }

    pub fn write_any(&mut self, value: &Value) -> Result<(), CodecError> {
        match value {
            Value::Null => self.write_null(),
            Value::Bool(b) => self.write_boolean(*b),
            Value::Number(n) => self.write_number(*n),
            Value::String(s) => self.write_str(s),
            Value::Bytes(b) => self.write_bin(b),
            Value::List(items) => return self.write_arr(items),
            Value::Object(obj) => return self.write_obj(obj),
            Value::Set(set) => return self.write_set(set),
            other => {
                return Err(CodecError::UnsupportedType {
                    format: "msgpack",
                    kind: other.kind(),
                })
            }
        }
        Ok(())
    }

    pub fn write_null(&mut self) {
        self.writer.u8(0xc0);
    }

    pub fn write_boolean(&mut self, b: bool) {
        self.writer.u8(if b { 0xc3 } else { 0xc2 });
    }

    pub fn write_number(&mut self, n: f64) {
        if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
            self.write_integer(n as i64);
        } else {
            self.write_float(n);
        }
    }

    pub fn write_float(&mut self, float: f64) {
        self.writer.u8f64(0xcb, float);
    }

    pub fn write_integer(&mut self, int: i64) {
        let writer = &mut self.writer;
        if int >= 0 {
            if int <= 0x7f {
                writer.u8(int as u8);
            } else if int <= 0xff {
                writer.u8(0xcc);
                writer.u8(int as u8);
            } else if int <= 0xffff {
                writer.u8u16(0xcd, int as u16);
            } else if int <= 0xffff_ffff {
                writer.u8u32(0xce, int as u32);
            } else {
                writer.u8(0xcf);
                writer.i64(int);
            }
        } else if int >= -0x20 {
            // negative fixint: 0xe0..0xff
            writer.u8(int as i8 as u8);
        } else if int >= -0x80 {
            writer.u8(0xd0);
            writer.u8(int as i8 as u8);
        } else if int >= -0x8000 {
            writer.u8u16(0xd1, int as i16 as u16);
        } else if int >= -0x8000_0000 {
            writer.u8u32(0xd2, int as i32 as u32);
        } else {
            writer.u8(0xd3);
            writer.i64(int);
        }
    }

    pub fn write_str_hdr(&mut self, length: usize) {
        if length <= 0x1f {
            self.writer.u8(0xa0 | length as u8);
        } else if length <= 0xff {
            self.writer.u16(0xd900 | length as u16);
        } else if length <= 0xffff {
            self.writer.u8u16(0xda, length as u16);
        } else {
            self.writer.u8u32(0xdb, length as u32);
        }
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_str_hdr(s.len());
        self.writer.utf8(s);
    }

    pub fn write_bin_hdr(&mut self, length: usize) {
        if length <= 0xff {
            self.writer.u16(0xc400 | length as u16);
        } else if length <= 0xffff {
            self.writer.u8u16(0xc5, length as u16);
        } else {
            self.writer.u8u32(0xc6, length as u32);
        }
    }

    pub fn write_bin(&mut self, buf: &[u8]) {
        self.write_bin_hdr(buf.len());
        self.writer.buf(buf);
    }

    pub fn write_arr_hdr(&mut self, length: usize) {
        if length <= 0xf {
            self.writer.u8(0x90 | length as u8);
        } else if length <= 0xffff {
            self.writer.u8u16(0xdc, length as u16);
        } else {
            self.writer.u8u32(0xdd, length as u32);
        }
    }

    pub fn write_arr(&mut self, items: &[Value]) -> Result<(), CodecError> {
        self.write_arr_hdr(items.len());
        for item in items {
            self.write_any(item)?;
        }
        Ok(())
    }

    pub fn write_obj_hdr(&mut self, length: usize) {
        if length <= 0xf {
            self.writer.u8(0x80 | length as u8);
        } else if length <= 0xffff {
            self.writer.u8u16(0xde, length as u16);
        } else {
            self.writer.u8u32(0xdf, length as u32);
        }
    }

    pub fn write_obj(&mut self, obj: &Object) -> Result<(), CodecError> {
        self.write_obj_hdr(obj.len());
        for (key, val) in obj {
            self.write_str(key);
            self.write_any(val)?;
        }
        Ok(())
    }

    /// Sets are an application extension whose payload is the encoded
    /// array of members.
    pub fn write_set(&mut self, set: &ValueSet) -> Result<(), CodecError> {
        let mut inner = MsgPackEncoder::with_alloc_size(256);
        inner.write_arr_hdr(set.len());
        for member in set {
            inner.write_any(member)?;
        }
        let payload = inner.writer.flush();
        self.write_ext(EXTENSIONS.set_id(), &payload);
        Ok(())
    }

    pub fn write_ext_hdr(&mut self, tag: i8, length: usize) {
        let tag = tag as u8;
        match length {
            1 => self.writer.u16(0xd400 | tag as u16),
            2 => self.writer.u16(0xd500 | tag as u16),
            4 => self.writer.u16(0xd600 | tag as u16),
            8 => self.writer.u16(0xd700 | tag as u16),
            16 => self.writer.u16(0xd800 | tag as u16),
            _ => {
                if length <= 0xff {
                    self.writer.u16(0xc700 | length as u16);
                } else if length <= 0xffff {
                    self.writer.u8u16(0xc8, length as u16);
                } else {
                    self.writer.u8u32(0xc9, length as u32);
                }
                self.writer.u8(tag);
            }
        }
    }

    pub fn write_ext(&mut self, tag: i8, payload: &[u8]) {
        self.write_ext_hdr(tag, payload.len());
        self.writer.buf(payload);
    }
}
