//! The response builder handed back by middleware.
//!
//! A [`Response`] is not yet an HTTP message: it carries a status, headers, an optional
//! [`Payload`] and an optional error. The [`Adapter`](crate::Adapter) decides which of these
//! ends up on the wire, with the error taking priority over the body.

use crate::body::ResponseBody;
use crate::error::SharedError;
use bytes::Bytes;
use http::header::{GetAll, IntoHeaderName};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use std::fmt;

/// A body value that any serde based [`Serializer`](crate::Serializer) can encode.
///
/// Implemented for every `Serialize + Debug + Send + Sync` type.
pub trait Value: erased_serde::Serialize + fmt::Debug + Send + Sync {}

impl<T> Value for T where T: Serialize + fmt::Debug + Send + Sync + ?Sized {}

erased_serde::serialize_trait_object!(Value);

/// The body carried by a [`Response`].
#[derive(Debug)]
pub enum Payload {
    Text(String),
    Bytes(Bytes),
    Value(Box<dyn Value>),
    /// only written as-is by the streaming adapter
    Stream(ResponseBody),
}

impl Payload {
    pub fn value<T>(value: T) -> Self
    where
        T: Serialize + fmt::Debug + Send + Sync + 'static,
    {
        Self::Value(Box::new(value))
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&'static str> for Payload {
    fn from(value: &'static str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<ResponseBody> for Payload {
    fn from(value: ResponseBody) -> Self {
        Self::Stream(value)
    }
}

/// A deferred action run after the response body has been written.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

pub struct Response {
    code: StatusCode,
    body: Option<Payload>,
    error: Option<SharedError>,
    headers: HeaderMap,
    callbacks: Vec<Callback>,
}

impl Response {
    /// A `200 OK` response without body, error or headers.
    pub fn new() -> Self {
        Self { code: StatusCode::OK, body: None, error: None, headers: HeaderMap::new(), callbacks: Vec::new() }
    }

    pub fn make<B: Into<Payload>>(code: StatusCode, body: B) -> Self {
        let mut response = Self::new();
        response.code = code;
        response.body = Some(body.into());
        response
    }

    pub fn make_error(code: StatusCode, error: SharedError) -> Self {
        let mut response = Self::new();
        response.code = code;
        response.error = Some(error);
        response
    }

    pub fn body(&self) -> Option<&Payload> {
        self.body.as_ref()
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn error(&self) -> Option<&SharedError> {
        self.error.as_ref()
    }

    /// Returns the first value stored under `key`.
    pub fn header<K: http::header::AsHeaderName>(&self, key: K) -> Option<&HeaderValue> {
        self.headers.get(key)
    }

    /// Returns every value stored under `key`, in insertion order.
    pub fn headers<K: http::header::AsHeaderName>(&self, key: K) -> GetAll<'_, HeaderValue> {
        self.headers.get_all(key)
    }

    pub fn raw_headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn raw_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn set_body<B: Into<Payload>>(&mut self, body: B) -> &mut Self {
        self.body = Some(body.into());
        self
    }

    /// Removes the body, leaving the response on the empty path.
    pub fn take_body(&mut self) -> Option<Payload> {
        self.body.take()
    }

    pub fn set_code(&mut self, code: StatusCode) -> &mut Self {
        self.code = code;
        self
    }

    pub fn set_error(&mut self, error: SharedError) -> &mut Self {
        self.error = Some(error);
        self
    }

    /// Appends `value` to the values already stored under `key`.
    pub fn add_header<K: IntoHeaderName>(&mut self, key: K, value: HeaderValue) -> &mut Self {
        self.headers.append(key, value);
        self
    }

    pub fn add_headers<I>(&mut self, key: HeaderName, values: I) -> &mut Self
    where
        I: IntoIterator<Item = HeaderValue>,
    {
        for value in values {
            self.headers.append(key.clone(), value);
        }
        self
    }

    /// Replaces every value stored under `key` with `value`.
    pub fn set_header<K: IntoHeaderName>(&mut self, key: K, value: HeaderValue) -> &mut Self {
        self.headers.insert(key, value);
        self
    }

    /// Replaces every value stored under `key` with `values`.
    pub fn set_headers<I>(&mut self, key: HeaderName, values: I) -> &mut Self
    where
        I: IntoIterator<Item = HeaderValue>,
    {
        self.headers.remove(&key);
        self.add_headers(key, values)
    }

    /// Registers an action to run once the body has been written.
    ///
    /// Callbacks only run for responses written through the body path; each one is spawned as
    /// its own task, with no ordering between them and no way to observe their completion.
    pub fn callback<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
        self
    }

    pub fn callbacks(&self) -> &[Callback] {
        &self.callbacks
    }

    pub fn take_callbacks(&mut self) -> Vec<Callback> {
        std::mem::take(&mut self.callbacks)
    }

    /// the parts that end up on the wire next to the written body
    pub(crate) fn into_head(self) -> (StatusCode, HeaderMap) {
        (self.code, self.headers)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("code", &self.code)
            .field("body", &self.body)
            .field("error", &self.error)
            .field("headers", &self.headers)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::response::{Payload, Response};
    use http::{HeaderName, HeaderValue, StatusCode};
    use std::collections::HashMap;
    use std::io;
    use std::sync::Arc;

    const FOO: HeaderName = HeaderName::from_static("foo");

    fn values<'a>(response: &'a Response, key: &str) -> Vec<&'a str> {
        response.headers(key).iter().map(|v| v.to_str().unwrap()).collect()
    }

    #[test]
    fn test_new_response_defaults() {
        let response = Response::new();

        assert_eq!(response.code(), StatusCode::OK);
        assert!(response.body().is_none());
        assert!(response.error().is_none());
        assert!(response.raw_headers().is_empty());
        assert!(response.callbacks().is_empty());
    }

    #[test]
    fn test_make_response() {
        let response = Response::make(StatusCode::NOT_FOUND, "missing");

        assert_eq!(response.code(), StatusCode::NOT_FOUND);
        assert!(matches!(response.body(), Some(Payload::Text(text)) if text == "missing"));
        assert!(response.error().is_none());
    }

    #[test]
    fn test_make_error_response() {
        let response = Response::make_error(StatusCode::BAD_REQUEST, Arc::new(io::Error::other("bad input")));

        assert_eq!(response.code(), StatusCode::BAD_REQUEST);
        assert!(response.body().is_none());
        assert_eq!(response.error().unwrap().to_string(), "bad input");
    }

    #[test]
    fn test_add_header_keeps_previous_values() {
        let mut response = Response::new();
        response.add_header(FOO, HeaderValue::from_static("bar"));
        response.add_header(FOO, HeaderValue::from_static("fizz"));

        assert_eq!(values(&response, "foo"), ["bar", "fizz"]);
        assert_eq!(response.header("foo").unwrap(), "bar");
    }

    #[test]
    fn test_add_headers() {
        let mut response = Response::new();
        response.add_headers(FOO, [HeaderValue::from_static("bar"), HeaderValue::from_static("fizz")]);

        assert_eq!(values(&response, "foo"), ["bar", "fizz"]);
    }

    #[test]
    fn test_set_header_overwrites() {
        let mut response = Response::new();
        response.add_headers(FOO, [HeaderValue::from_static("bar"), HeaderValue::from_static("fizz")]);
        response.set_header(FOO, HeaderValue::from_static("buzz"));

        assert_eq!(values(&response, "foo"), ["buzz"]);
    }

    #[test]
    fn test_set_headers_overwrites_many() {
        let mut response = Response::new();
        response.add_header(FOO, HeaderValue::from_static("bar"));
        response.set_headers(FOO, [HeaderValue::from_static("fizz"), HeaderValue::from_static("buzz")]);

        assert_eq!(values(&response, "foo"), ["fizz", "buzz"]);
    }

    #[test]
    fn test_missing_header() {
        let response = Response::new();

        assert!(response.header("foo").is_none());
        assert_eq!(response.headers("foo").iter().count(), 0);
    }

    #[test]
    fn test_setters_chain() {
        let mut response = Response::new();
        response.set_code(StatusCode::FORBIDDEN).set_body(Payload::value(HashMap::<String, Vec<i32>>::new()));

        assert_eq!(response.code(), StatusCode::FORBIDDEN);
        assert!(matches!(response.body(), Some(Payload::Value(_))));

        assert!(response.take_body().is_some());
        assert!(response.body().is_none());
    }

    #[test]
    fn test_error_and_body_coexist() {
        let mut response = Response::make(StatusCode::OK, "body");
        response.set_error(Arc::new(io::Error::other("boom")));

        assert!(response.body().is_some());
        assert_eq!(response.error().unwrap().to_string(), "boom");
    }

    #[test]
    fn test_callbacks() {
        let mut response = Response::new();
        response.callback(|| {}).callback(|| {});

        assert_eq!(response.callbacks().len(), 2);

        let callbacks = response.take_callbacks();
        assert_eq!(callbacks.len(), 2);
        assert!(response.callbacks().is_empty());
    }
}
