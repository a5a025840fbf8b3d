//! Codec lookup by media type, file name or codec name.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::codec::Codec;
use crate::error::CodecError;
use crate::json::JsonCodec;
use crate::jsonl::JsonLinesCodec;
use crate::msgpack::MsgPackCodec;
use crate::xml::XmlCodec;
use crate::yaml::YamlCodec;

/// Indexes codecs by the media types and extensions they declare.
///
/// Keys are lowercase. When two codecs claim the same key the first
/// registered wins.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn Codec>>,
    by_media_type: IndexMap<String, usize>,
    by_extension: IndexMap<String, usize>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON, JSON Lines, YAML, MessagePack and XML. The native codec is
    /// not registered: it must never be picked for untrusted input.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(JsonCodec::new()));
        registry.register(Arc::new(JsonLinesCodec::new()));
        registry.register(Arc::new(YamlCodec::new()));
        registry.register(Arc::new(MsgPackCodec::new()));
        registry.register(Arc::new(XmlCodec::new()));
        registry
    }

    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        let index = self.codecs.len();
        for media_type in codec.handles() {
            self.by_media_type
                .entry(media_type.to_ascii_lowercase())
                .or_insert(index);
        }
        for ext in codec.extensions() {
            self.by_extension
                .entry(ext.to_ascii_lowercase())
                .or_insert(index);
        }
        self.codecs.push(codec);
    }

    /// Finds the codec for a media type or a file name.
    ///
    /// An exact media type match wins; media type parameters such as
    /// `; charset=utf-8` are ignored. Otherwise a query containing a `.` is
    /// matched against `.<extension>` suffixes in registration order.
    pub fn lookup(&self, query: &str) -> Option<&Arc<dyn Codec>> {
        let query = query.trim().to_ascii_lowercase();
        let media_type = query.split(';').next().unwrap_or_default().trim();
        if let Some(&i) = self.by_media_type.get(media_type) {
            return self.codecs.get(i);
        }
        if !query.contains('.') {
            return None;
        }
        self.by_extension
            .iter()
            .find(|(ext, _)| {
                query
                    .strip_suffix(ext.as_str())
                    .is_some_and(|stem| stem.ends_with('.'))
            })
            .and_then(|(_, &i)| self.codecs.get(i))
    }

    /// Like [`lookup`](Self::lookup), reporting a miss as an error.
    pub fn resolve(&self, query: &str) -> Result<&Arc<dyn Codec>, CodecError> {
        self.lookup(query)
            .ok_or_else(|| CodecError::SourceIdentification {
                query: query.to_owned(),
            })
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<dyn Codec>> {
        self.codecs
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    pub fn codecs(&self) -> impl Iterator<Item = &Arc<dyn Codec>> {
        self.codecs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_of(registry: &CodecRegistry, query: &str) -> Option<&'static str> {
        registry.lookup(query).map(|c| c.name())
    }

    #[test]
    fn media_types() {
        let r = CodecRegistry::with_defaults();
        assert_eq!(name_of(&r, "application/json"), Some("json"));
        assert_eq!(name_of(&r, "Application/JSON; charset=utf-8"), Some("json"));
        assert_eq!(name_of(&r, "application/x-ndjson"), Some("jsonl"));
        assert_eq!(name_of(&r, "text/yaml"), Some("yaml"));
        assert_eq!(name_of(&r, "application/msgpack"), Some("msgpack"));
        assert_eq!(name_of(&r, "text/xml"), Some("xml"));
    }

    #[test]
    fn file_names() {
        let r = CodecRegistry::with_defaults();
        assert_eq!(name_of(&r, "data.JSON"), Some("json"));
        assert_eq!(name_of(&r, "/tmp/a.b/rows.ndjson"), Some("jsonl"));
        assert_eq!(name_of(&r, "conf.yml"), Some("yaml"));
        assert_eq!(name_of(&r, "blob.msgpack"), Some("msgpack"));
    }

    #[test]
    fn suffix_must_follow_a_dot() {
        let r = CodecRegistry::with_defaults();
        assert_eq!(name_of(&r, "file.notjson"), None);
        assert_eq!(name_of(&r, "json"), None);
    }

    #[test]
    fn native_is_not_reachable() {
        let r = CodecRegistry::with_defaults();
        assert!(r.by_name("native").is_none());
        assert!(r.codecs().all(|c| c.name() != "native"));
    }

    #[test]
    fn resolve_reports_miss() {
        let r = CodecRegistry::with_defaults();
        let err = r.resolve("image/png").err().unwrap();
        assert!(matches!(err, CodecError::SourceIdentification { query } if query == "image/png"));
    }
}
