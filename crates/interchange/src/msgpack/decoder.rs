//! `MsgPackDecoder`: MessagePack reader producing raw values.

use interchange_buffers::Reader;

use super::ext::EXTENSIONS;
use super::MsgPackError;
use crate::value::{BigInteger, Object, Value, ValueMap, MAX_DEPTH};

const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

pub struct MsgPackDecoder<'a> {
    reader: Reader<'a>,
    /// Open arrays and maps, including those of enclosing extension payloads.
    depth: usize,
}

impl<'a> MsgPackDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::nested(data, 0)
    }

    /// Decoder for an extension payload found `depth` containers deep.
    pub(crate) fn nested(data: &'a [u8], depth: usize) -> Self {
        Self {
            reader: Reader::new(data),
            depth,
        }
    }

    /// Reads exactly one value; leftover bytes are an error.
    pub fn decode(mut self) -> Result<Value, MsgPackError> {
        let value = self.read_any()?;
        if self.reader.size() > 0 {
            return Err(MsgPackError::TrailingData(self.reader.x));
        }
        Ok(value)
    }

    pub fn read_any(&mut self) -> Result<Value, MsgPackError> {
        let at = self.reader.x;
        let byte = self.reader.u8()?;

        // negative fixint: 0xe0..0xff
        if byte >= 0xe0 {
            return Ok(Value::Number(byte as i8 as f64));
        }
        // positive fixint
        if byte <= 0x7f {
            return Ok(Value::Number(byte as f64));
        }
        if (0x80..=0x8f).contains(&byte) {
            return self.read_map(byte as usize & 0xf);
        }
        if (0x90..=0x9f).contains(&byte) {
            return self.read_arr(byte as usize & 0xf);
        }
        if (0xa0..=0xbf).contains(&byte) {
            return self.read_str(byte as usize & 0x1f);
        }

        match byte {
            0xc0 => Ok(Value::Null),
            0xc2 => Ok(Value::Bool(false)),
            0xc3 => Ok(Value::Bool(true)),
            0xc4 => {
                let n = self.reader.u8()? as usize;
                self.read_bin(n)
            }
            0xc5 => {
                let n = self.reader.u16()? as usize;
                self.read_bin(n)
            }
            0xc6 => {
                let n = self.reader.u32()? as usize;
                self.read_bin(n)
            }
            0xc7 => {
                let n = self.reader.u8()? as usize;
                self.read_ext(n)
            }
            0xc8 => {
                let n = self.reader.u16()? as usize;
                self.read_ext(n)
            }
            0xc9 => {
                let n = self.reader.u32()? as usize;
                self.read_ext(n)
            }
            0xca => Ok(Value::Number(self.reader.f32()? as f64)),
            0xcb => Ok(Value::Number(self.reader.f64()?)),
            0xcc => Ok(Value::Number(self.reader.u8()? as f64)),
            0xcd => Ok(Value::Number(self.reader.u16()? as f64)),
            0xce => Ok(Value::Number(self.reader.u32()? as f64)),
            0xcf => {
                let n = self.reader.u64()?;
                Ok(if n <= MAX_SAFE_INTEGER {
                    Value::Number(n as f64)
                } else {
                    Value::BigInteger(BigInteger::from(n))
                })
            }
            0xd0 => Ok(Value::Number(self.reader.i8()? as f64)),
            0xd1 => Ok(Value::Number(self.reader.i16()? as f64)),
            0xd2 => Ok(Value::Number(self.reader.i32()? as f64)),
            0xd3 => {
                let n = self.reader.i64()?;
                Ok(if n.unsigned_abs() <= MAX_SAFE_INTEGER {
                    Value::Number(n as f64)
                } else {
                    Value::BigInteger(BigInteger::from(n))
                })
            }
            0xd4 => self.read_ext(1),
            0xd5 => self.read_ext(2),
            0xd6 => self.read_ext(4),
            0xd7 => self.read_ext(8),
            0xd8 => self.read_ext(16),
            0xd9 => {
                let n = self.reader.u8()? as usize;
                self.read_str(n)
            }
            0xda => {
                let n = self.reader.u16()? as usize;
                self.read_str(n)
            }
            0xdb => {
                let n = self.reader.u32()? as usize;
                self.read_str(n)
            }
            0xdc => {
                let n = self.reader.u16()? as usize;
                self.read_arr(n)
            }
            0xdd => {
                let n = self.reader.u32()? as usize;
                self.read_arr(n)
            }
            0xde => {
                let n = self.reader.u16()? as usize;
                self.read_map(n)
            }
            0xdf => {
                let n = self.reader.u32()? as usize;
                self.read_map(n)
            }
            _ => Err(MsgPackError::InvalidByte(at)),
        }
    }

    fn read_str(&mut self, size: usize) -> Result<Value, MsgPackError> {
        Ok(Value::String(self.reader.utf8(size)?.to_owned()))
    }

    fn read_bin(&mut self, size: usize) -> Result<Value, MsgPackError> {
        Ok(Value::Bytes(self.reader.buf(size)?.to_vec()))
    }

    fn enter(&mut self) -> Result<(), MsgPackError> {
        if self.depth >= MAX_DEPTH {
            return Err(MsgPackError::TooDeep(self.reader.x));
        }
        self.depth += 1;
        Ok(())
    }

    fn read_arr(&mut self, size: usize) -> Result<Value, MsgPackError> {
        self.enter()?;
        // Cap the preallocation: `size` comes from untrusted input.
        let mut arr = Vec::with_capacity(size.min(self.reader.size()));
        for _ in 0..size {
            arr.push(self.read_any()?);
        }
        self.depth -= 1;
        Ok(Value::List(arr))
    }

    /// String-keyed maps become objects; any other key makes it a [`ValueMap`].
    fn read_map(&mut self, size: usize) -> Result<Value, MsgPackError> {
        self.enter()?;
        let mut entries = Vec::with_capacity(size.min(self.reader.size()));
        for _ in 0..size {
            let key = self.read_any()?;
            let val = self.read_any()?;
            entries.push((key, val));
        }
        self.depth -= 1;
        if entries.iter().all(|(k, _)| matches!(k, Value::String(_))) {
            let mut obj = Object::with_capacity(entries.len());
            for (k, v) in entries {
                if let Value::String(k) = k {
                    obj.insert(k, v);
                }
            }
            Ok(Value::Object(obj))
        } else {
            Ok(Value::Map(entries.into_iter().collect::<ValueMap>()))
        }
    }

    fn read_ext(&mut self, size: usize) -> Result<Value, MsgPackError> {
        let tag = self.reader.i8()?;
        let payload = self.reader.buf(size)?;
        EXTENSIONS.decode(tag, payload, self.depth)
    }
}
