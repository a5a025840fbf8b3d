//! Incremental JSON tokenizer.
//!
//! Bytes are fed in arbitrary chunks. [`Tokenizer::next`] returns `None`
//! when the buffered bytes end in the middle of a token, leaving them in
//! place until more input arrives.

use super::decoder::{decode_json_string, parse_number, scan_number};
use super::JsonError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    BeginArray,
    EndArray,
    BeginObject,
    EndObject,
    Comma,
    Colon,
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
}

impl Token {
    pub fn describe(&self) -> &'static str {
        match self {
            Token::BeginArray => "'['",
            Token::EndArray => "']'",
            Token::BeginObject => "'{'",
            Token::EndObject => "'}'",
            Token::Comma => "','",
            Token::Colon => "':'",
            Token::Str(_) => "string",
            Token::Num(_) => "number",
            Token::Bool(_) => "boolean",
            Token::Null => "null",
        }
    }
}

#[derive(Default)]
pub struct Tokenizer {
    buf: Vec<u8>,
    /// Read position in `buf`.
    x: usize,
    /// Bytes already dropped from the front of `buf`, for error offsets.
    offset: usize,
    /// Where an incomplete string resumes scanning for its closing quote.
    /// Never rests after a lone trailing `\`.
    scan: usize,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes buffered but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len() - self.x
    }

    /// Total bytes consumed so far.
    pub fn position(&self) -> usize {
        self.offset + self.x
    }

    /// Drops consumed bytes from the buffer.
    pub fn compact(&mut self) {
        if self.x > 0 {
            self.buf.drain(..self.x);
            self.offset += self.x;
            self.scan = self.scan.saturating_sub(self.x);
            self.x = 0;
        }
    }

    /// Next complete token. With `eof` set, a partial token is an error.
    pub fn next(&mut self, eof: bool) -> Result<Option<Token>, JsonError> {
        while self.x < self.buf.len() && matches!(self.buf[self.x], b' ' | b'\t' | b'\n' | b'\r') {
            self.x += 1;
        }
        let Some(&byte) = self.buf.get(self.x) else {
            return Ok(None);
        };
        let single = match byte {
            b'[' => Some(Token::BeginArray),
            b']' => Some(Token::EndArray),
            b'{' => Some(Token::BeginObject),
            b'}' => Some(Token::EndObject),
            b',' => Some(Token::Comma),
            b':' => Some(Token::Colon),
            _ => None,
        };
        if let Some(token) = single {
            self.x += 1;
            return Ok(Some(token));
        }
        match byte {
            b'"' => self.string(eof),
            b't' => self.literal(b"true", Token::Bool(true), eof),
            b'f' => self.literal(b"false", Token::Bool(false), eof),
            b'n' => self.literal(b"null", Token::Null, eof),
            b'-' | b'0'..=b'9' => self.number(eof),
            _ => Err(JsonError::Invalid(self.position())),
        }
    }

    fn incomplete(&self, eof: bool) -> Result<Option<Token>, JsonError> {
        if eof {
            Err(JsonError::UnexpectedEnd)
        } else {
            Ok(None)
        }
    }

    fn string(&mut self, eof: bool) -> Result<Option<Token>, JsonError> {
        let x0 = self.x + 1;
        let mut x = self.scan.max(x0);
        while x < self.buf.len() {
            match self.buf[x] {
                b'"' => {
                    let s = decode_json_string(&self.buf[x0..x], self.offset + x0)?;
                    self.x = x + 1;
                    self.scan = 0;
                    return Ok(Some(Token::Str(s)));
                }
                b'\\' if x + 1 == self.buf.len() => break,
                b'\\' => x += 2,
                _ => x += 1,
            }
        }
        self.scan = x;
        self.incomplete(eof)
    }

    fn literal(&mut self, literal: &[u8], token: Token, eof: bool) -> Result<Option<Token>, JsonError> {
        let rest = &self.buf[self.x..];
        if rest.starts_with(literal) {
            self.x += literal.len();
            Ok(Some(token))
        } else if literal.starts_with(rest) {
            self.incomplete(eof)
        } else {
            Err(JsonError::Invalid(self.position()))
        }
    }

    fn number(&mut self, eof: bool) -> Result<Option<Token>, JsonError> {
        let end = scan_number(&self.buf, self.x);
        if end == self.buf.len() && !eof {
            // More digits may follow in the next chunk.
            return Ok(None);
        }
        let n = parse_number(&self.buf[self.x..end], self.position())?;
        self.x = end;
        Ok(Some(Token::Num(n)))
    }
}
