//! Streaming JSON: an incremental decoder that emits the members of a
//! top-level array or object as they complete, and encoders that frame a
//! sequence of values as one array or object document.

use std::collections::VecDeque;

use tracing::trace;

use super::encoder::JsonEncoder;
use super::tokenizer::{Token, Tokenizer};
use super::{JsonDecoderOptions, JsonError};
use crate::error::CodecError;
use crate::protocol::Protocol;
use crate::stream::Transform;
use crate::value::{Object, Value, MAX_DEPTH};

/// What the parser accepts next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Root,
    Value,
    ValueOrEnd,
    Key,
    KeyOrEnd,
    Colon,
    CommaOrEnd,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    Array,
    Object,
}

enum Builder {
    List(Vec<Value>),
    Object(Object),
}

/// Parser state between chunks.
struct ParserState {
    /// Open containers below the root.
    stack: Vec<Builder>,
    /// Keys read but not yet assigned. At most one per open object, so the
    /// innermost object's key is always on top.
    pending_keys: Vec<String>,
    root: Option<Root>,
    expect: Expect,
    /// Bytes consumed since the last emitted element.
    bytes: usize,
}

/// Incremental decoder for a JSON array or object arriving in chunks.
///
/// Array roots emit each element. Object roots emit `[key, value]` lists.
/// Elements are revived as they complete.
pub struct JsonStreamDecoder {
    tokenizer: Tokenizer,
    state: ParserState,
    limit: usize,
}

impl JsonStreamDecoder {
    pub fn new(options: JsonDecoderOptions) -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            state: ParserState {
                stack: Vec::new(),
                pending_keys: Vec::new(),
                root: None,
                expect: Expect::Root,
                bytes: 0,
            },
            limit: options.max_value_bytes,
        }
    }

    fn drain(&mut self, eof: bool, out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        loop {
            let before = self.tokenizer.position();
            let token = self.tokenizer.next(eof)?;
            self.state.bytes += self.tokenizer.position() - before;
            if self.state.bytes > self.limit {
                return Err(CodecError::PayloadTooLarge { limit: self.limit });
            }
            let Some(token) = token else {
                return Ok(());
            };
            let at = self.tokenizer.position();
            self.state.accept(token, at, out)?;
        }
    }
}

impl ParserState {
    fn context(&self) -> Option<Root> {
        match self.stack.last() {
            Some(Builder::List(_)) => Some(Root::Array),
            Some(Builder::Object(_)) => Some(Root::Object),
            None => self.root,
        }
    }

    fn after_comma(&self) -> Expect {
        match self.context() {
            Some(Root::Object) => Expect::Key,
            _ => Expect::Value,
        }
    }

    fn accept(&mut self, token: Token, at: usize, out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        let expect = self.expect;
        let wants_value = matches!(expect, Expect::Value | Expect::ValueOrEnd);
        match token {
            _ if expect == Expect::Done => Err(JsonError::TrailingData(at).into()),
            Token::BeginArray if expect == Expect::Root => {
                self.root = Some(Root::Array);
                self.expect = Expect::ValueOrEnd;
                Ok(())
            }
            Token::BeginObject if expect == Expect::Root => {
                self.root = Some(Root::Object);
                self.expect = Expect::KeyOrEnd;
                Ok(())
            }
            Token::Str(_) | Token::Num(_) | Token::Bool(_) | Token::Null
                if expect == Expect::Root =>
            {
                Err(CodecError::RootType {
                    found: token.describe(),
                })
            }
            Token::Str(key) if matches!(expect, Expect::Key | Expect::KeyOrEnd) => {
                self.pending_keys.push(key);
                self.expect = Expect::Colon;
                Ok(())
            }
            Token::Colon if expect == Expect::Colon => {
                self.expect = Expect::Value;
                Ok(())
            }
            Token::Comma if expect == Expect::CommaOrEnd => {
                self.expect = self.after_comma();
                Ok(())
            }
            Token::BeginArray | Token::BeginObject
                if wants_value && self.stack.len() + 1 >= MAX_DEPTH =>
            {
                Err(JsonError::TooDeep(at).into())
            }
            Token::BeginArray if wants_value => {
                self.stack.push(Builder::List(Vec::new()));
                self.expect = Expect::ValueOrEnd;
                Ok(())
            }
            Token::BeginObject if wants_value => {
                self.stack.push(Builder::Object(Object::new()));
                self.expect = Expect::KeyOrEnd;
                Ok(())
            }
            Token::Str(s) if wants_value => self.append(Value::String(s), out),
            Token::Num(n) if wants_value => self.append(Value::Number(n), out),
            Token::Bool(b) if wants_value => self.append(Value::Bool(b), out),
            Token::Null if wants_value => self.append(Value::Null, out),
            Token::EndArray
                if matches!(expect, Expect::ValueOrEnd | Expect::CommaOrEnd)
                    && self.context() == Some(Root::Array) =>
            {
                self.close(out)
            }
            Token::EndObject
                if matches!(expect, Expect::KeyOrEnd | Expect::CommaOrEnd)
                    && self.context() == Some(Root::Object) =>
            {
                self.close(out)
            }
            _ => Err(JsonError::Invalid(at).into()),
        }
    }

    fn close(&mut self, out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        match self.stack.pop() {
            Some(Builder::List(items)) => self.append(Value::List(items), out),
            Some(Builder::Object(obj)) => {
                let value = Protocol::JSON.revive_object(obj)?;
                self.append(value, out)
            }
            None => {
                self.expect = Expect::Done;
                Ok(())
            }
        }
    }

    fn append(&mut self, value: Value, out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        self.expect = Expect::CommaOrEnd;
        match self.stack.last_mut() {
            Some(Builder::List(items)) => items.push(value),
            Some(Builder::Object(obj)) => {
                let key = self.pending_keys.pop().ok_or(JsonError::Invalid(0))?;
                obj.insert(key, value);
            }
            None => {
                let element = match self.root {
                    Some(Root::Object) => {
                        let key = self.pending_keys.pop().ok_or(JsonError::Invalid(0))?;
                        Value::List(vec![Value::String(key), value])
                    }
                    _ => value,
                };
                trace!(bytes = self.bytes, "json stream element complete");
                self.bytes = 0;
                out.push_back(element);
            }
        }
        Ok(())
    }
}

impl Transform for JsonStreamDecoder {
    type Input = Vec<u8>;
    type Output = Value;

    fn push(&mut self, input: Vec<u8>, out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        self.tokenizer.feed(&input);
        self.drain(false, out)?;
        self.tokenizer.compact();
        if self.state.bytes + self.tokenizer.buffered() > self.limit {
            return Err(CodecError::PayloadTooLarge { limit: self.limit });
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut VecDeque<Value>) -> Result<(), CodecError> {
        self.drain(true, out)?;
        match self.state.expect {
            // Empty input decodes to an empty stream.
            Expect::Root | Expect::Done => Ok(()),
            _ => Err(JsonError::UnexpectedEnd.into()),
        }
    }
}

/// Frames values as a pretty top-level array: `[\n  a,\n  b\n]\n`.
#[derive(Default)]
pub struct JsonArrayEncoder {
    encoder: JsonEncoder,
    count: usize,
}

impl JsonArrayEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transform for JsonArrayEncoder {
    type Input = Value;
    type Output = Vec<u8>;

    fn push(&mut self, input: Value, out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
        let body = self.encoder.encode(&input)?;
        let mut chunk = Vec::with_capacity(body.len() + 4);
        chunk.extend_from_slice(if self.count == 0 { b"[\n  " } else { b",\n  " });
        chunk.extend_from_slice(&body);
        self.count += 1;
        out.push_back(chunk);
        Ok(())
    }

    fn finish(&mut self, out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
        let tail: &[u8] = if self.count == 0 { b"[]\n" } else { b"\n]\n" };
        out.push_back(tail.to_vec());
        Ok(())
    }
}

/// Frames `[key, value]` pairs as a top-level object: `{\n  "k": v\n}\n`.
#[derive(Default)]
pub struct JsonObjectEncoder {
    encoder: JsonEncoder,
    count: usize,
}

impl JsonObjectEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transform for JsonObjectEncoder {
    type Input = Value;
    type Output = Vec<u8>;

    fn push(&mut self, input: Value, out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
        let (key, value) = match input {
            Value::List(pair) => match <[Value; 2]>::try_from(pair) {
                Ok([Value::String(key), value]) => (key, value),
                _ => return Err(not_a_pair()),
            },
            _ => return Err(not_a_pair()),
        };
        let body = self.encoder.encode(&value)?;
        self.encoder.write_str(&key);
        let key = self.encoder.writer.flush();
        let mut chunk = Vec::with_capacity(key.len() + body.len() + 6);
        chunk.extend_from_slice(if self.count == 0 { b"{\n  " } else { b",\n  " });
        chunk.extend_from_slice(&key);
        chunk.extend_from_slice(b": ");
        chunk.extend_from_slice(&body);
        self.count += 1;
        out.push_back(chunk);
        Ok(())
    }

    fn finish(&mut self, out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
        let tail: &[u8] = if self.count == 0 { b"{}\n" } else { b"\n}\n" };
        out.push_back(tail.to_vec());
        Ok(())
    }
}

fn not_a_pair() -> CodecError {
    CodecError::Encode {
        format: "json",
        reason: "object stream items must be [string key, value] pairs".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Pipeline;

    fn decode_chunks(chunks: &[&str]) -> Result<Vec<Value>, CodecError> {
        let decoder = JsonStreamDecoder::new(JsonDecoderOptions::default());
        Pipeline::new(decoder, chunks.iter().map(|c| c.as_bytes().to_vec())).collect()
    }

    fn encode_all<T: Transform<Input = Value, Output = Vec<u8>>>(encoder: T, values: Vec<Value>) -> String {
        let chunks: Vec<Vec<u8>> = Pipeline::new(encoder, values.into_iter())
            .collect::<Result<_, _>>()
            .unwrap();
        String::from_utf8(chunks.concat()).unwrap()
    }

    #[test]
    fn array_elements_stream_out() {
        let out = decode_chunks(&["[1, {\"a\"", ": [2]}, \"x\"", "]"]).unwrap();
        assert_eq!(
            out,
            vec![
                Value::from(1),
                Value::object([("a", Value::list([2]))]),
                Value::from("x"),
            ]
        );
    }

    #[test]
    fn object_root_emits_pairs() {
        let out = decode_chunks(&[r#"{"a": {"b": 1}, "c": [true]}"#]).unwrap();
        assert_eq!(
            out,
            vec![
                Value::list([Value::from("a"), Value::object([("b", 1)])]),
                Value::list([Value::from("c"), Value::list([true])]),
            ]
        );
    }

    #[test]
    fn nested_keys_do_not_leak() {
        let out = decode_chunks(&[r#"{"outer": {"inner": {"deep": 1}, "next": 2}}"#]).unwrap();
        assert_eq!(
            out,
            vec![Value::list([
                Value::from("outer"),
                Value::object([
                    ("inner", Value::object([("deep", 1)])),
                    ("next", Value::from(2)),
                ]),
            ])]
        );
    }

    #[test]
    fn scalar_root_is_rejected() {
        assert!(matches!(
            decode_chunks(&["42"]),
            Err(CodecError::RootType { found: "number" })
        ));
    }

    #[test]
    fn truncated_document_fails_on_finish() {
        assert!(decode_chunks(&["[1, 2"]).is_err());
    }

    #[test]
    fn missing_comma_fails() {
        assert!(decode_chunks(&["[1 2]"]).is_err());
    }

    #[test]
    fn envelopes_are_revived() {
        let out = decode_chunks(&[r#"[{"type":"Buffer","data":[1,2]}]"#]).unwrap();
        assert_eq!(out, vec![Value::bytes([1, 2])]);
    }

    #[test]
    fn oversized_element_is_rejected() {
        let decoder = JsonStreamDecoder::new(JsonDecoderOptions { max_value_bytes: 16 });
        let chunks = vec![b"[1, \"".to_vec(), vec![b'a'; 32], b"\"]".to_vec()];
        let result: Result<Vec<Value>, _> = Pipeline::new(decoder, chunks.into_iter()).collect();
        assert!(matches!(result, Err(CodecError::PayloadTooLarge { limit: 16 })));
    }

    #[test]
    fn counter_resets_per_element() {
        let decoder = JsonStreamDecoder::new(JsonDecoderOptions { max_value_bytes: 16 });
        let chunks = vec![b"[\"aaaaaaaa\", \"bbbbbbbb\", \"cccccccc\"]".to_vec()];
        let out: Vec<Value> = Pipeline::new(decoder, chunks.into_iter())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn nesting_is_bounded() {
        let inner = MAX_DEPTH - 1;
        let ok = format!("[{}{}]", "[".repeat(inner), "]".repeat(inner));
        assert_eq!(decode_chunks(&[&ok]).unwrap().len(), 1);

        let deep = "[".repeat(100_000);
        assert!(matches!(
            decode_chunks(&[&deep]),
            Err(CodecError::Decode(crate::error::DecodeError::Json(JsonError::TooDeep(_))))
        ));
    }

    #[test]
    fn array_framing() {
        assert_eq!(encode_all(JsonArrayEncoder::new(), vec![]), "[]\n");
        assert_eq!(
            encode_all(JsonArrayEncoder::new(), vec![Value::from(1), Value::object([("a", 2)])]),
            "[\n  1,\n  {\"a\":2}\n]\n"
        );
    }

    #[test]
    fn object_framing() {
        assert_eq!(encode_all(JsonObjectEncoder::new(), vec![]), "{}\n");
        assert_eq!(
            encode_all(
                JsonObjectEncoder::new(),
                vec![Value::list([Value::from("a"), Value::from(1)])]
            ),
            "{\n  \"a\": 1\n}\n"
        );
    }

    #[test]
    fn object_encoder_rejects_non_pairs() {
        let mut enc = JsonObjectEncoder::new();
        let mut out = VecDeque::new();
        assert!(enc.push(Value::from(1), &mut out).is_err());
    }
}
