//! The per-call request accessor handed to middleware and wrappers.
//!
//! [`Request`] wraps a raw `http::Request` and adds three things on top of it:
//! - a body that is read from the transport at most once and cached afterwards
//! - a sticky error: once set, no further body work happens for this request
//! - a context bag for passing data from one middleware to the next

use crate::error::{AdapterError, BoxError, SharedError};
use crate::processor::BodyProcessor;
use bytes::Bytes;
use http::header::{AsHeaderName, GetAll};
use http::request::Parts;
use http::{Extensions, HeaderValue, Method, Uri, Version};
use http_body::Body as HttpBody;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// The type-erased raw body, as it is handed back by [`Request::into_raw`].
pub type RawBody = UnsyncBoxBody<Bytes, BoxError>;

pub struct Request {
    parts: Parts,
    query: Vec<(String, String)>,
    // the mutex is never locked, it only keeps `Request` Sync around an unsync body
    raw_body: Mutex<RawBody>,
    body: Option<Bytes>,
    has_body: bool,
    error: Option<SharedError>,
    context: Extensions,
}

impl Request {
    /// Wraps a raw request, failing with [`AdapterError::WrappedNil`] when there is none.
    pub fn new<B>(raw: Option<http::Request<B>>) -> Result<Self, AdapterError>
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = raw.ok_or(AdapterError::WrappedNil)?.into_parts();
        let query = parse_query(parts.uri.query());

        Ok(Self {
            parts,
            query,
            raw_body: Mutex::new(body.map_err(Into::into).boxed_unsync()),
            body: None,
            has_body: false,
            error: None,
            context: Extensions::new(),
        })
    }

    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn version(&self) -> Version {
        self.parts.version
    }

    /// The host from the request target, falling back to the `Host` header.
    pub fn host(&self) -> Option<&str> {
        self.parts
            .uri
            .host()
            .or_else(|| self.parts.headers.get(http::header::HOST).and_then(|value| value.to_str().ok()))
    }

    /// Returns the first header value stored under `key`.
    pub fn header<K: AsHeaderName>(&self, key: K) -> Option<&HeaderValue> {
        self.parts.headers.get(key)
    }

    /// Returns every header value stored under `key`.
    pub fn headers<K: AsHeaderName>(&self, key: K) -> GetAll<'_, HeaderValue> {
        self.parts.headers.get_all(key)
    }

    /// Returns the first query parameter stored under `key`.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Returns every query parameter stored under `key`, in the order they appear.
    pub fn parameters(&self, key: &str) -> Vec<&str> {
        self.query.iter().filter(|(k, _)| k == key).map(|(_, v)| v.as_str()).collect()
    }

    /// Deserializes the whole query string into `T`.
    pub fn query_as<'de, T: Deserialize<'de>>(&'de self) -> Result<T, serde_qs::Error> {
        serde_qs::from_str(self.parts.uri.query().unwrap_or_default())
    }

    /// Returns the request body, reading it from the transport on the first call.
    ///
    /// Returns `None` when the read failed, or when an error was recorded before the body was
    /// ever read; the error is available from [`Request::error`].
    pub async fn body(&mut self) -> Option<&Bytes> {
        self.read_body().await;
        self.body.as_ref()
    }

    pub fn error(&self) -> Option<&SharedError> {
        self.error.as_ref()
    }

    /// Records `error` unless an earlier error is already stored.
    pub fn set_error(&mut self, error: SharedError) -> &mut Self {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self
    }

    /// Runs `processor` against the body bytes, storing its error as the sticky error.
    ///
    /// Does nothing when `processor` is `None` or an error has already been recorded.
    /// When reading the body fails the processor is skipped and the read error is kept.
    pub async fn process_body<P: BodyProcessor>(&mut self, processor: Option<P>) -> &mut Self {
        let Some(mut processor) = processor else {
            return self;
        };
        if self.error.is_some() {
            return self;
        }

        self.read_body().await;

        if let Some(body) = &self.body
            && let Err(e) = processor.process(body)
        {
            self.error = Some(Arc::from(e));
        }
        self
    }

    pub fn context(&self) -> &Extensions {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Extensions {
        &mut self.context
    }

    /// Returns the raw request. Once the body has been read, the raw body replays the cached
    /// bytes.
    pub fn into_raw(self) -> http::Request<RawBody> {
        http::Request::from_parts(self.parts, self.raw_body.into_inner())
    }

    async fn read_body(&mut self) {
        if self.error.is_some() || self.has_body {
            return;
        }
        self.has_body = true;

        let raw_body = std::mem::replace(self.raw_body.get_mut(), empty_body());
        match raw_body.collect().await {
            Ok(collected) => {
                let bytes = collected.to_bytes();
                *self.raw_body.get_mut() = replay_body(bytes.clone());
                self.body = Some(bytes);
            }
            Err(e) => {
                warn!(cause = %e, uri = %self.parts.uri, "failed to read request body");
                self.error = Some(Arc::from(e));
            }
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("headers", &self.parts.headers)
            .field("body", &self.body)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

fn parse_query(query: Option<&str>) -> Vec<(String, String)> {
    let Some(query) = query else {
        return Vec::new();
    };

    serde_urlencoded::from_str(query).unwrap_or_else(|e| {
        warn!(cause = %e, query, "failed to parse query string");
        Vec::new()
    })
}

fn empty_body() -> RawBody {
    Empty::new().map_err(|never| match never {}).boxed_unsync()
}

fn replay_body(bytes: Bytes) -> RawBody {
    Full::new(bytes).map_err(|never| match never {}).boxed_unsync()
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::error::{AdapterError, BoxError};
    use crate::processor;
    use crate::request::Request;
    use bytes::Bytes;
    use futures::StreamExt;
    use http_body::{Body as HttpBody, Frame};
    use http_body_util::{BodyExt, Empty, StreamBody};
    use serde::Deserialize;
    use std::io;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn get(uri: &str) -> http::Request<Empty<Bytes>> {
        http::Request::builder().uri(uri).body(Empty::new()).unwrap()
    }

    /// A body yielding `chunks`, counting how many chunks were pulled out of it.
    pub(crate) fn counting_body(
        chunks: Vec<&'static str>,
        pulled: Arc<AtomicUsize>,
    ) -> impl HttpBody<Data = Bytes, Error = io::Error> + Send + 'static {
        let stream = futures::stream::iter(chunks).map(move |chunk| {
            pulled.fetch_add(1, Ordering::SeqCst);
            Ok(Frame::data(Bytes::from_static(chunk.as_bytes())))
        });
        StreamBody::new(stream)
    }

    fn failing_body() -> impl HttpBody<Data = Bytes, Error = io::Error> + Send + 'static {
        StreamBody::new(futures::stream::iter(vec![Err::<Frame<Bytes>, _>(io::Error::other("some err"))]))
    }

    fn with_body<B>(body: B) -> Request
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Request::new(Some(http::Request::builder().uri("http://foo.bar").body(body).unwrap())).unwrap()
    }

    #[test]
    fn test_wrap_missing_request() {
        let result = Request::new(None::<http::Request<Empty<Bytes>>>);
        assert!(matches!(result, Err(AdapterError::WrappedNil)));
    }

    #[tokio::test]
    async fn test_body_is_read_once() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let mut request = with_body(counting_body(vec!["some ", "test value"], pulled.clone()));

        for _ in 0..3 {
            assert_eq!(request.body().await.unwrap(), &Bytes::from("some test value"));
        }
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_body_not_read_when_error_present() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let mut request = with_body(counting_body(vec!["value"], pulled.clone()));
        request.set_error(Arc::new(io::Error::other("earlier")));

        assert!(request.body().await.is_none());
        assert_eq!(pulled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_body_read_error_is_stored() {
        let mut request = with_body(failing_body());

        assert!(request.body().await.is_none());
        assert_eq!(request.error().unwrap().to_string(), "some err");
    }

    #[tokio::test]
    async fn test_body_is_replayed_to_raw_request() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let mut request = with_body(counting_body(vec!["some test value"], pulled.clone()));
        request.body().await;

        let raw = request.into_raw();
        let replayed = raw.into_body().collect().await.unwrap().to_bytes();

        assert_eq!(replayed, Bytes::from("some test value"));
        assert_eq!(pulled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unread_body_is_handed_back() {
        let request = with_body(counting_body(vec!["untouched"], Arc::new(AtomicUsize::new(0))));

        let raw = request.into_raw();
        assert_eq!(raw.into_body().collect().await.unwrap().to_bytes(), Bytes::from("untouched"));
    }

    #[test]
    fn test_headers() {
        let raw = http::Request::builder()
            .uri("http://foo.bar")
            .header("foo", "bar")
            .header("foo", "fizz")
            .header("foo", "buzz")
            .body(Empty::<Bytes>::new())
            .unwrap();
        let request = Request::new(Some(raw)).unwrap();

        assert_eq!(request.header("foo").unwrap(), "bar");
        assert_eq!(request.header("Foo").unwrap(), "bar");
        let all: Vec<_> = request.headers("foo").iter().map(|v| v.to_str().unwrap()).collect();
        assert_eq!(all, ["bar", "fizz", "buzz"]);

        assert!(request.header("bar").is_none());
        assert_eq!(request.headers("bar").iter().count(), 0);
    }

    #[test]
    fn test_parameters() {
        let request = Request::new(Some(get("http://foo.bar/?foo=bar&foo=fizz&x=a%20b"))).unwrap();

        assert_eq!(request.parameter("foo"), Some("bar"));
        assert_eq!(request.parameters("foo"), ["bar", "fizz"]);
        assert_eq!(request.parameter("x"), Some("a b"));
        assert_eq!(request.parameter("missing"), None);
        assert!(request.parameters("missing").is_empty());
    }

    #[test]
    fn test_no_query() {
        let request = Request::new(Some(get("http://foo.bar/path"))).unwrap();
        assert!(request.parameter("foo").is_none());
    }

    #[test]
    fn test_query_as() {
        #[derive(Deserialize)]
        struct Page {
            page: u32,
            size: u32,
        }

        let request = Request::new(Some(get("/items?page=2&size=20"))).unwrap();
        let page: Page = request.query_as().unwrap();

        assert_eq!((page.page, page.size), (2, 20));
    }

    #[test]
    fn test_host() {
        let request = Request::new(Some(get("http://foo.bar/path"))).unwrap();
        assert_eq!(request.host(), Some("foo.bar"));

        let raw = http::Request::builder().uri("/path").header("host", "fizz.buzz").body(Empty::<Bytes>::new()).unwrap();
        let request = Request::new(Some(raw)).unwrap();
        assert_eq!(request.host(), Some("fizz.buzz"));
    }

    #[test]
    fn test_set_error_keeps_first() {
        let mut request = Request::new(Some(get("/"))).unwrap();
        request.set_error(Arc::new(io::Error::other("first"))).set_error(Arc::new(io::Error::other("second")));

        assert_eq!(request.error().unwrap().to_string(), "first");
    }

    #[tokio::test]
    async fn test_process_body_stores_processor_error() {
        let mut request = with_body(counting_body(vec!["{"], Arc::new(AtomicUsize::new(0))));
        let mut value: Option<Vec<u32>> = None;

        request.process_body(Some(processor::json(&mut value))).await;

        assert!(request.error().is_some());
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_process_body_passes_body() {
        let mut request = with_body(counting_body(vec!["[1,", "2]"], Arc::new(AtomicUsize::new(0))));
        let mut value: Option<Vec<u32>> = None;

        let error = request.process_body(Some(processor::json(&mut value))).await.error().cloned();

        assert!(error.is_none());
        assert_eq!(value, Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_process_body_skipped_after_error() {
        let mut request = with_body(counting_body(vec!["body"], Arc::new(AtomicUsize::new(0))));
        request.set_error(Arc::new(io::Error::other("first")));

        let mut calls = 0;
        request
            .process_body(Some(|_: &[u8]| -> Result<(), io::Error> {
                calls += 1;
                Err(io::Error::other("second"))
            }))
            .await;

        assert_eq!(calls, 0);
        assert_eq!(request.error().unwrap().to_string(), "first");
    }

    #[tokio::test]
    async fn test_process_body_skipped_on_read_error() {
        let mut request = with_body(failing_body());

        let mut calls = 0;
        request
            .process_body(Some(|_: &[u8]| -> Result<(), io::Error> {
                calls += 1;
                Ok(())
            }))
            .await;

        assert_eq!(calls, 0);
        assert_eq!(request.error().unwrap().to_string(), "some err");
    }

    #[tokio::test]
    async fn test_process_body_without_processor() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let mut request = with_body(counting_body(vec!["body"], pulled.clone()));

        request.process_body(None::<fn(&[u8]) -> Result<(), io::Error>>).await;

        assert!(request.error().is_none());
        assert_eq!(pulled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_process_body_chains() {
        let mut request = with_body(counting_body(vec!["abc"], Arc::new(AtomicUsize::new(0))));
        let mut lengths = Vec::new();

        request
            .process_body(Some(|b: &[u8]| -> Result<(), io::Error> {
                lengths.push(b.len());
                Ok(())
            }))
            .await
            .process_body(Some(|_: &[u8]| -> Result<(), io::Error> { Err(io::Error::other("invalid")) }))
            .await;

        assert_eq!(lengths, [3]);
        assert_eq!(request.error().unwrap().to_string(), "invalid");
    }

    #[test]
    fn test_context() {
        #[derive(Clone, Debug, PartialEq)]
        struct UserId(u64);

        let mut request = Request::new(Some(get("/"))).unwrap();
        request.context_mut().insert(UserId(7));

        assert_eq!(request.context().get::<UserId>(), Some(&UserId(7)));
        assert!(request.context().get::<String>().is_none());
    }
}
