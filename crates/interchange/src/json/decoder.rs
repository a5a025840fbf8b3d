//! `JsonDecoder`: whole-document JSON parser producing a raw [`Value`] tree.
//!
//! The tree is not revived; callers run [`crate::protocol::Protocol::revive`]
//! over the result. In lenient mode `//` and `/* */` comments and trailing
//! commas are accepted.

use super::JsonError;
use crate::value::{Object, Value, MAX_DEPTH};

pub struct JsonDecoder<'a> {
    data: &'a [u8],
    pub x: usize,
    lenient: bool,
    depth: usize,
}

impl<'a> JsonDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            x: 0,
            lenient: false,
            depth: 0,
        }
    }

    pub fn lenient(data: &'a [u8]) -> Self {
        Self {
            data,
            x: 0,
            lenient: true,
            depth: 0,
        }
    }

    /// Parses one complete document; anything but whitespace after it fails.
    pub fn decode(mut self) -> Result<Value, JsonError> {
        let value = self.read_any()?;
        self.skip_whitespace()?;
        if self.x < self.data.len() {
            return Err(JsonError::TrailingData(self.x));
        }
        Ok(value)
    }

    fn peek(&self) -> Result<u8, JsonError> {
        self.data.get(self.x).copied().ok_or(JsonError::UnexpectedEnd)
    }

    pub fn read_any(&mut self) -> Result<Value, JsonError> {
        self.skip_whitespace()?;
        match self.peek()? {
            b'"' => Ok(Value::String(self.read_str()?)),
            b'[' => self.read_arr(),
            b'{' => self.read_obj(),
            b't' => self.read_literal(b"true", Value::Bool(true)),
            b'f' => self.read_literal(b"false", Value::Bool(false)),
            b'n' => self.read_literal(b"null", Value::Null),
            b'-' | b'0'..=b'9' => self.read_num(),
            _ => Err(JsonError::Invalid(self.x)),
        }
    }

    pub fn skip_whitespace(&mut self) -> Result<(), JsonError> {
        while self.x < self.data.len() {
            match self.data[self.x] {
                b' ' | b'\t' | b'\n' | b'\r' => self.x += 1,
                b'/' if self.lenient => self.skip_comment()?,
                _ => break,
            }
        }
        Ok(())
    }

    fn skip_comment(&mut self) -> Result<(), JsonError> {
        let rest = &self.data[self.x..];
        if rest.starts_with(b"//") {
            match rest.iter().position(|&b| b == b'\n') {
                Some(end) => self.x += end + 1,
                None => self.x = self.data.len(),
            }
            Ok(())
        } else if rest.starts_with(b"/*") {
            match rest[2..].windows(2).position(|w| w == b"*/") {
                Some(end) => {
                    self.x += end + 4;
                    Ok(())
                }
                None => Err(JsonError::UnexpectedEnd),
            }
        } else {
            Err(JsonError::Invalid(self.x))
        }
    }

    fn read_literal(&mut self, literal: &[u8], value: Value) -> Result<Value, JsonError> {
        if self.data[self.x..].starts_with(literal) {
            self.x += literal.len();
            Ok(value)
        } else if literal.starts_with(&self.data[self.x..]) {
            Err(JsonError::UnexpectedEnd)
        } else {
            Err(JsonError::Invalid(self.x))
        }
    }

    pub fn read_num(&mut self) -> Result<Value, JsonError> {
        let start = self.x;
        let end = scan_number(self.data, start);
        self.x = end;
        parse_number(&self.data[start..end], start).map(Value::Number)
    }

    pub fn read_str(&mut self) -> Result<String, JsonError> {
        let x0 = self.x + 1;
        let x1 = find_ending_quote(self.data, x0).ok_or(JsonError::UnexpectedEnd)?;
        let s = decode_json_string(&self.data[x0..x1], x0)?;
        self.x = x1 + 1;
        Ok(s)
    }

    fn enter(&mut self) -> Result<(), JsonError> {
        if self.depth >= MAX_DEPTH {
            return Err(JsonError::TooDeep(self.x));
        }
        self.depth += 1;
        self.x += 1;
        Ok(())
    }

    pub fn read_arr(&mut self) -> Result<Value, JsonError> {
        self.enter()?;
        let mut arr = Vec::new();
        loop {
            self.skip_whitespace()?;
            if self.peek()? == b']' {
                self.x += 1;
                self.depth -= 1;
                return Ok(Value::List(arr));
            }
            if !arr.is_empty() {
                self.expect(b',')?;
                self.skip_whitespace()?;
                if self.lenient && self.peek()? == b']' {
                    continue;
                }
            }
            arr.push(self.read_any()?);
        }
    }

    pub fn read_obj(&mut self) -> Result<Value, JsonError> {
        self.enter()?;
        let mut obj = Object::new();
        let mut first = true;
        loop {
            self.skip_whitespace()?;
            if self.peek()? == b'}' {
                self.x += 1;
                self.depth -= 1;
                return Ok(Value::Object(obj));
            }
            if !first {
                self.expect(b',')?;
                self.skip_whitespace()?;
                if self.lenient && self.peek()? == b'}' {
                    continue;
                }
            }
            if self.peek()? != b'"' {
                return Err(JsonError::Invalid(self.x));
            }
            let key = self.read_str()?;
            self.skip_whitespace()?;
            self.expect(b':')?;
            let val = self.read_any()?;
            obj.insert(key, val);
            first = false;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), JsonError> {
        if self.peek()? != byte {
            return Err(JsonError::Invalid(self.x));
        }
        self.x += 1;
        Ok(())
    }
}

/// Index one past the last byte of the number starting at `start`.
pub(crate) fn scan_number(data: &[u8], start: usize) -> usize {
    let mut x = start;
    while x < data.len() && matches!(data[x], b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') {
        x += 1;
    }
    x
}

pub(crate) fn parse_number(bytes: &[u8], at: usize) -> Result<f64, JsonError> {
    let valid_start = match bytes {
        [b'-', rest @ ..] => rest.first().is_some_and(u8::is_ascii_digit),
        [first, ..] => first.is_ascii_digit(),
        [] => false,
    };
    if !valid_start {
        return Err(JsonError::Invalid(at));
    }
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or(JsonError::Invalid(at))
}

/// Index of the closing quote for a string body starting at `x0`.
pub(crate) fn find_ending_quote(data: &[u8], x0: usize) -> Option<usize> {
    let mut x = x0;
    while x < data.len() {
        match data[x] {
            b'"' => return Some(x),
            b'\\' => x += 2,
            _ => x += 1,
        }
    }
    None
}

/// Decodes a JSON string body (between the quotes).
pub(crate) fn decode_json_string(bytes: &[u8], at: usize) -> Result<String, JsonError> {
    if !bytes.contains(&b'\\') {
        return std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| JsonError::InvalidUtf8);
    }
    let mut quoted = Vec::with_capacity(bytes.len() + 2);
    quoted.push(b'"');
    quoted.extend_from_slice(bytes);
    quoted.push(b'"');
    serde_json::from_slice(&quoted).map_err(|_| JsonError::InvalidString(at))
}
