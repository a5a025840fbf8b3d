//! Tagged-tree document model and XML serializer.
//!
//! A tagged tree is the list form of an element:
//! `[tag, attributes?, ...children]`, where `attributes` is an object of
//! string values and each child is a string or another tagged tree.

use crate::value::{Object, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Element(Element),
}

/// An element with attributes in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Replaces an existing attribute in place or appends a new one.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// Concatenated text children.
    pub fn inner_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                Node::Text(s) => Some(s.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Tagged-tree form. The attribute object is present only when the
    /// element has attributes.
    pub fn to_value(&self) -> Value {
        let mut items = Vec::with_capacity(self.children.len() + 2);
        items.push(Value::String(self.tag.clone()));
        if !self.attrs.is_empty() {
            let attrs: Object = self
                .attrs
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            items.push(Value::Object(attrs));
        }
        for child in &self.children {
            items.push(match child {
                Node::Text(s) => Value::String(s.clone()),
                Node::Element(el) => el.to_value(),
            });
        }
        Value::List(items)
    }

    /// Reads a tagged tree that serializes to markup and parses back to the
    /// same value: valid names, non-empty string attributes when present,
    /// no empty or adjacent text children, and no whitespace-only text
    /// beside elements.
    pub fn from_value(value: &Value) -> Option<Element> {
        let items = value.as_list()?;
        let (tag, rest) = items.split_first()?;
        let tag = tag.as_str()?;
        if !is_name(tag) {
            return None;
        }
        let mut el = Element::new(tag);
        let mut rest = rest;
        if let Some((Value::Object(attrs), tail)) = rest.split_first() {
            if attrs.is_empty() {
                return None;
            }
            for (k, v) in attrs {
                if !is_name(k) {
                    return None;
                }
                el.attrs.push((k.clone(), v.as_str()?.to_owned()));
            }
            rest = tail;
        }
        for child in rest {
            match child {
                Value::String(s) => {
                    if s.is_empty() || matches!(el.children.last(), Some(Node::Text(_))) {
                        return None;
                    }
                    el.children.push(Node::Text(s.clone()));
                }
                other => el.children.push(Node::Element(Element::from_value(other)?)),
            }
        }
        let has_elements = el.elements().next().is_some();
        let blank_text = el
            .children
            .iter()
            .any(|c| matches!(c, Node::Text(s) if s.trim().is_empty()));
        if has_elements && blank_text {
            return None;
        }
        Some(el)
    }

    /// Compact markup.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write(&mut out, "", "");
        out
    }

    /// Markup with one element per line, indented by `tab`. Elements with
    /// any text child are written inline.
    pub fn to_xml_pretty(&self, tab: &str) -> String {
        let mut out = String::new();
        self.write(&mut out, tab, "");
        out
    }

    fn write(&self, out: &mut String, tab: &str, indent: &str) {
        out.push('<');
        out.push_str(&self.tag);
        for (k, v) in &self.attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            escape_attr(v, out);
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        let block = !tab.is_empty()
            && self.children.iter().all(|c| matches!(c, Node::Element(_)));
        let inner = format!("{indent}{tab}");
        for child in &self.children {
            if block {
                out.push('\n');
                out.push_str(&inner);
            }
            match child {
                Node::Text(s) => escape_text(s, out),
                Node::Element(el) => el.write(out, if block { tab } else { "" }, &inner),
            }
        }
        if block {
            out.push('\n');
            out.push_str(indent);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

fn escape_text(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '&' => out.push_str("&amp;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(ch),
        }
    }
}

pub(crate) fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
}
