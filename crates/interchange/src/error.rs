//! Error types shared by all codecs.

use crate::json::JsonError;
use crate::msgpack::MsgPackError;
use crate::native::NativeError;
use crate::xml::XmlError;

/// Top-level error returned by codec and stream operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("{format} cannot encode a {kind} value")]
    UnsupportedType {
        format: &'static str,
        kind: &'static str,
    },

    #[error("{format} encoder failed: {reason}")]
    Encode {
        format: &'static str,
        reason: String,
    },

    /// A single streamed value grew past the configured byte limit.
    #[error("streamed value exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// The root of a streamed JSON document was neither an array nor an object.
    #[error("stream root must be an array or an object, found {found}")]
    RootType { found: &'static str },

    #[error("no codec registered for {query:?}")]
    SourceIdentification { query: String },

    #[error("{codec} codec does not support {operation}")]
    UnsupportedOperation {
        codec: &'static str,
        operation: &'static str,
    },

    #[error("stream is closed")]
    StreamClosed,

    #[error("scratch store is closed")]
    StoreClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Malformed input, by format.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("json: {0}")]
    Json(#[from] JsonError),
    #[error("msgpack: {0}")]
    MsgPack(#[from] MsgPackError),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("xml: {0}")]
    Xml(#[from] XmlError),
    #[error("native: {0}")]
    Native(#[from] NativeError),
    #[error("extended type: {0}")]
    Envelope(#[from] EnvelopeError),
}

/// Failure to revive an extended-type envelope or to unwrap a stream frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("unknown extended type {0:?}")]
    UnknownTag(String),
    #[error("malformed {tag} payload")]
    Malformed { tag: &'static str },
    #[error("stream item is not a single-field {{\"value\": ...}} object")]
    NotWrapped,
    #[error("values nested deeper than {} levels", crate::value::MAX_DEPTH)]
    TooDeep,
}

macro_rules! decode_error_into_codec_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for CodecError {
                fn from(err: $ty) -> Self {
                    CodecError::Decode(DecodeError::from(err))
                }
            }
        )*
    };
}

decode_error_into_codec_error!(
    JsonError,
    MsgPackError,
    serde_yaml::Error,
    XmlError,
    NativeError,
    EnvelopeError,
);

impl CodecError {
    pub(crate) fn unsupported(codec: &'static str, operation: &'static str) -> Self {
        CodecError::UnsupportedOperation { codec, operation }
    }
}
