use std::error::Error;
use std::sync::Arc;
use thiserror::Error;

/// The error type accepted at every pluggable seam: processors, serializers and handlers.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// A clonable error, stored on [`Request`](crate::Request) and [`Response`](crate::Response)
/// so the same failure can be handed from one to the other.
pub type SharedError = Arc<dyn Error + Send + Sync>;

/// Failures raised by the [`Adapter`](crate::Adapter) itself.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("cannot wrap a missing request")]
    WrappedNil,

    #[error("no handlers")]
    NoHandlers,
}

/// Failures raised while turning a response body into bytes.
#[derive(Error, Debug)]
pub enum SerializeError {
    #[error("json serialize error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("xml serialize error: {source}")]
    Xml {
        #[from]
        source: serde_xml_rs::Error,
    },

    #[error("stream body can not be serialized")]
    Stream,

    #[error("no serializer configured")]
    Missing,
}

impl AdapterError {
    pub(crate) fn shared(self) -> SharedError {
        Arc::new(self)
    }
}
