//! Builds an [`Element`] tree from `quick-xml` events.
//!
//! The declaration, processing instructions, comments and `DOCTYPE` are
//! skipped. Text and CDATA runs are merged into one text node, and
//! whitespace-only text is dropped from elements that have element
//! children.

use std::fmt::Display;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::tree::{Element, Node};
use crate::value::MAX_DEPTH;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum XmlError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("malformed markup at byte {at}: {reason}")]
    Malformed { at: usize, reason: String },
    #[error("invalid UTF-8")]
    InvalidUtf8,
    #[error("document has no root element")]
    NoRoot,
    #[error("content after the root element at byte {0}")]
    TrailingData(usize),
    #[error("elements nested deeper than {MAX_DEPTH} levels at byte {0}")]
    TooDeep(usize),
    #[error("unexpected <{0}> in encoded value")]
    UnexpectedElement(String),
    #[error("invalid <{tag}> content")]
    InvalidContent { tag: String },
}

fn malformed(at: usize, reason: impl Display) -> XmlError {
    XmlError::Malformed {
        at,
        reason: reason.to_string(),
    }
}

pub struct XmlParser<'a> {
    reader: Reader<&'a [u8]>,
    stack: Vec<Element>,
    root: Option<Element>,
}

impl<'a> XmlParser<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            reader: Reader::from_str(src),
            stack: Vec::new(),
            root: None,
        }
    }

    pub fn parse_bytes(bytes: &[u8]) -> Result<Element, XmlError> {
        let src = std::str::from_utf8(bytes).map_err(|_| XmlError::InvalidUtf8)?;
        XmlParser::new(src.strip_prefix('\u{feff}').unwrap_or(src)).parse()
    }

    /// Parses a whole document with exactly one root element.
    pub fn parse(mut self) -> Result<Element, XmlError> {
        loop {
            let at = self.reader.buffer_position() as usize;
            let event = match self.reader.read_event() {
                Ok(event) => event,
                Err(err) => return Err(malformed(self.reader.error_position() as usize, err)),
            };
            match event {
                Event::Start(start) => {
                    let el = self.open(&start, at)?;
                    if self.stack.len() >= MAX_DEPTH {
                        return Err(XmlError::TooDeep(at));
                    }
                    self.stack.push(el);
                }
                Event::Empty(start) => {
                    let el = self.open(&start, at)?;
                    self.close(el);
                }
                Event::End(_) => match self.stack.pop() {
                    Some(el) => self.close(el),
                    None => return Err(malformed(at, "closing tag without an open element")),
                },
                Event::Text(text) => {
                    let text = text.unescape().map_err(|err| malformed(at, err))?;
                    self.text(&text, at)?;
                }
                Event::CData(data) => {
                    let text = std::str::from_utf8(&data).map_err(|_| XmlError::InvalidUtf8)?;
                    self.text(text, at)?;
                }
                Event::Eof => break,
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            }
        }
        if !self.stack.is_empty() {
            return Err(XmlError::UnexpectedEnd);
        }
        self.root.ok_or(XmlError::NoRoot)
    }

    fn open(&self, start: &BytesStart<'_>, at: usize) -> Result<Element, XmlError> {
        if self.stack.is_empty() && self.root.is_some() {
            return Err(XmlError::TrailingData(at));
        }
        let name = start.name();
        let tag = std::str::from_utf8(name.as_ref()).map_err(|_| XmlError::InvalidUtf8)?;
        let mut el = Element::new(tag);
        for attr in start.attributes() {
            let attr = attr.map_err(|err| malformed(at, err))?;
            let name = std::str::from_utf8(attr.key.as_ref()).map_err(|_| XmlError::InvalidUtf8)?;
            let value = attr.unescape_value().map_err(|err| malformed(at, err))?;
            el.attrs.push((name.to_owned(), value.into_owned()));
        }
        Ok(el)
    }

    fn close(&mut self, mut el: Element) {
        if el.elements().next().is_some() {
            el.children
                .retain(|c| !matches!(c, Node::Text(s) if s.trim().is_empty()));
        }
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(Node::Element(el)),
            None => self.root = Some(el),
        }
    }

    fn text(&mut self, text: &str, at: usize) -> Result<(), XmlError> {
        let Some(parent) = self.stack.last_mut() else {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(match self.root {
                Some(_) => XmlError::TrailingData(at),
                None => malformed(at, "text before the root element"),
            });
        };
        if text.is_empty() {
            return Ok(());
        }
        match parent.children.last_mut() {
            Some(Node::Text(prev)) => prev.push_str(text),
            _ => parent.children.push(Node::Text(text.to_owned())),
        }
        Ok(())
    }
}
