//! `JsonEncoder`: writes UTF-8 JSON for a [`Value`] into a [`Writer`].
//!
//! Extended types are lowered through [`Protocol::JSON`] first, so the
//! writer itself only deals with the JSON-native subset.

use interchange_buffers::Writer;

use crate::error::CodecError;
use crate::protocol::Protocol;
use crate::value::{Object, Value};

pub struct JsonEncoder {
    pub writer: Writer,
    /// Spaces per nesting level; `0` writes compact output.
    indent: usize,
}

impl Default for JsonEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonEncoder {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(),
            indent: 0,
        }
    }

    pub fn pretty(indent: usize) -> Self {
        Self {
            writer: Writer::new(),
            indent,
        }
    }

    pub fn encode(&mut self, value: &Value) -> Result<Vec<u8>, CodecError> {
        self.writer.reset();
        let replaced = Protocol::JSON.replace(value);
        if let Err(err) = self.write_any(&replaced, 0) {
            self.writer.reset();
            return Err(err);
        }
        Ok(self.writer.flush())
    }

    /// Writes an already-replaced value.
    pub fn write_any(&mut self, value: &Value, depth: usize) -> Result<(), CodecError> {
        match value {
            Value::Null => self.write_null(),
            Value::Bool(b) => self.write_boolean(*b),
            Value::Number(n) => self.write_number(*n),
            Value::String(s) => self.write_str(s),
            Value::List(items) => return self.write_arr(items, depth),
            Value::Object(obj) => return self.write_obj(obj, depth),
            other => {
                return Err(CodecError::UnsupportedType {
                    format: "json",
                    kind: other.kind(),
                })
            }
        }
        Ok(())
    }

    pub fn write_null(&mut self) {
        self.writer.u32(0x6e756c6c); // "null"
    }

    pub fn write_boolean(&mut self, b: bool) {
        if b {
            self.writer.u32(0x74727565); // "true"
        } else {
            self.writer.u8(b'f');
            self.writer.u32(0x616c7365); // "alse"
        }
    }

    pub fn write_number(&mut self, num: f64) {
        self.writer.ascii(&format_number(num));
    }

    /// Writes a quoted, escaped JSON string.
    pub fn write_str(&mut self, s: &str) {
        let plain = s
            .bytes()
            .all(|b| (32..127).contains(&b) && b != b'"' && b != b'\\');
        self.writer.u8(b'"');
        if plain {
            self.writer.utf8(s);
        } else {
            self.write_escaped(s);
        }
        self.writer.u8(b'"');
    }

    fn write_escaped(&mut self, s: &str) {
        let mut start = 0;
        for (i, b) in s.bytes().enumerate() {
            let escape: Option<&str> = match b {
                b'"' => Some("\\\""),
                b'\\' => Some("\\\\"),
                b'\n' => Some("\\n"),
                b'\r' => Some("\\r"),
                b'\t' => Some("\\t"),
                0x08 => Some("\\b"),
                0x0c => Some("\\f"),
                0..=0x1f => None,
                _ => continue,
            };
            self.writer.utf8(&s[start..i]);
            match escape {
                Some(e) => self.writer.ascii(e),
                None => self.writer.ascii(&format!("\\u{:04x}", b)),
            }
            start = i + 1;
        }
        self.writer.utf8(&s[start..]);
    }

    fn newline(&mut self, depth: usize) {
        if self.indent > 0 {
            self.writer.u8(b'\n');
            for _ in 0..depth * self.indent {
                self.writer.u8(b' ');
            }
        }
    }

    pub fn write_arr(&mut self, items: &[Value], depth: usize) -> Result<(), CodecError> {
        if items.is_empty() {
            self.writer.ascii("[]");
            return Ok(());
        }
        self.writer.u8(b'[');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.writer.u8(b',');
            }
            self.newline(depth + 1);
            self.write_any(item, depth + 1)?;
        }
        self.newline(depth);
        self.writer.u8(b']');
        Ok(())
    }

    pub fn write_obj(&mut self, obj: &Object, depth: usize) -> Result<(), CodecError> {
        if obj.is_empty() {
            self.writer.ascii("{}");
            return Ok(());
        }
        self.writer.u8(b'{');
        for (i, (key, val)) in obj.iter().enumerate() {
            if i > 0 {
                self.writer.u8(b',');
            }
            self.newline(depth + 1);
            self.write_str(key);
            self.writer.u8(b':');
            if self.indent > 0 {
                self.writer.u8(b' ');
            }
            self.write_any(val, depth + 1)?;
        }
        self.newline(depth);
        self.writer.u8(b'}');
        Ok(())
    }
}

/// Shortest representation that parses back to the same `f64`.
pub(crate) fn format_number(f: f64) -> String {
    if !f.is_finite() {
        return "null".to_owned();
    }
    if f.fract() == 0.0 && f.abs() < 1e15 {
        return format!("{}", f as i64);
    }
    let abs = f.abs();
    if abs >= 1e21 || abs < 1e-6 {
        format!("{:e}", f)
    } else {
        format!("{}", f)
    }
}
