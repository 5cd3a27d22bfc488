//! The [`Adapter`] runs one request through an ordered middleware chain and writes the
//! outcome as an `http::Response`.
//!
//! Every call goes through the same steps:
//!
//! 1. the raw request is wrapped into a [`Request`]
//! 2. request hooks of the installed [`RequestWrapper`]s run in registration order
//! 3. middleware runs in order until one of them produces a [`Response`]
//! 4. response hooks run in reverse registration order
//! 5. the response is written through exactly one of three paths:
//!    - the error path when the response carries an error
//!    - the empty path when it carries no body
//!    - the body path otherwise, whose body runs the response callbacks once it has been read
//!
//! # Example
//!
//! ```no_run
//! use http::StatusCode;
//! use micro_chain::{Adapter, Response, middleware_fn};
//!
//! # async fn run(raw: http::Request<http_body_util::Empty<bytes::Bytes>>) {
//! let adapter = Adapter::json()
//!     .handler(middleware_fn(|req| req.parameter("name").map(|name| Response::make(StatusCode::OK, name.to_owned()))))
//!     .handler(middleware_fn(|_| Some(Response::make(StatusCode::NOT_FOUND, "who are you?"))));
//!
//! let response = adapter.call(raw).await;
//! # }
//! ```

use crate::body::ResponseBody;
use crate::error::{AdapterError, BoxError, SerializeError, SharedError};
use crate::handler::{DefaultEmptyHandler, EmptyHandler, Middleware};
use crate::request::Request;
use crate::response::{Payload, Response};
use crate::serialize::{
    DefaultJsonErrorSerializer, DefaultXmlErrorSerializer, ErrorSerializer, JsonSerializer, Serializer, XmlSerializer,
};
use crate::wrapper::RequestWrapper;
use bytes::Bytes;
use http::HeaderValue;
use http::header::CONTENT_TYPE;
use http_body::Body as HttpBody;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Runs requests through an ordered middleware chain and writes the outcome as an `http::Response`.
pub struct Adapter {
    content_type: Option<HeaderValue>,
    mode: Mode,
    error_serializer: Option<Box<dyn ErrorSerializer>>,
    empty_handler: Option<Box<dyn EmptyHandler>>,
    handlers: Vec<Option<Box<dyn Middleware>>>,
    // `None` until a wrapper is installed, which also switches the no-response policy
    wrappers: Option<Vec<Box<dyn RequestWrapper>>>,
}

enum Mode {
    Buffered(Option<Box<dyn Serializer>>),
    Streaming,
}

impl Adapter {
    /// An adapter without content type, serializers or empty handler.
    pub fn empty() -> Self {
        Self {
            content_type: None,
            mode: Mode::Buffered(None),
            error_serializer: None,
            empty_handler: None,
            handlers: Vec::new(),
            wrappers: None,
        }
    }

    /// An adapter writing `application/json` through `serde_json`.
    pub fn json() -> Self {
        Self::new(mime::APPLICATION_JSON, JsonSerializer, DefaultJsonErrorSerializer)
    }

    /// An adapter writing `application/xml` through `serde-xml-rs`.
    pub fn xml() -> Self {
        Self::new("application/xml", XmlSerializer, DefaultXmlErrorSerializer)
    }

    /// A buffered adapter with the given content type and serializers, writing nothing for empty responses.
    pub fn new<S, E>(content_type: impl AsRef<str>, serializer: S, error_serializer: E) -> Self
    where
        S: Serializer + 'static,
        E: ErrorSerializer + 'static,
    {
        Self::empty()
            .content_type(content_type)
            .serializer(serializer)
            .error_serializer(error_serializer)
            .empty_handler(DefaultEmptyHandler)
    }

    /// A streaming adapter: bodies are written without a serializer, and
    /// [`Payload::Stream`] bodies are passed through to the transport.
    pub fn stream<E>(content_type: impl AsRef<str>, error_serializer: E) -> Self
    where
        E: ErrorSerializer + 'static,
    {
        let mut adapter =
            Self::empty().content_type(content_type).error_serializer(error_serializer).empty_handler(DefaultEmptyHandler);
        adapter.mode = Mode::Streaming;
        adapter
    }

    /// Sets the `Content-Type` written when the response doesn't carry one. An empty value
    /// clears it.
    pub fn content_type(mut self, content_type: impl AsRef<str>) -> Self {
        let content_type = content_type.as_ref();
        if content_type.is_empty() {
            self.content_type = None;
            return self;
        }

        match HeaderValue::from_str(content_type) {
            Ok(value) => self.content_type = Some(value),
            Err(e) => warn!(cause = %e, content_type, "rejected invalid content type"),
        }
        self
    }

    pub fn serializer<S: Serializer + 'static>(mut self, serializer: S) -> Self {
        match &mut self.mode {
            Mode::Buffered(current) => *current = Some(Box::new(serializer)),
            Mode::Streaming => debug!("streaming adapter ignores the body serializer"),
        }
        self
    }

    pub fn error_serializer<E: ErrorSerializer + 'static>(mut self, error_serializer: E) -> Self {
        self.error_serializer = Some(Box::new(error_serializer));
        self
    }

    pub fn empty_handler<H: EmptyHandler + 'static>(mut self, empty_handler: H) -> Self {
        self.empty_handler = Some(Box::new(empty_handler));
        self
    }

    /// Appends a middleware to the chain.
    pub fn handler<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.handlers.push(Some(Box::new(middleware)));
        self
    }

    /// Appends middleware to the chain. `None` entries are kept and skipped when the chain runs.
    pub fn add_handlers<I, M>(mut self, handlers: I) -> Self
    where
        I: IntoIterator<Item = Option<M>>,
        M: Middleware + 'static,
    {
        self.handlers.extend(handlers.into_iter().map(|m| m.map(|m| Box::new(m) as Box<dyn Middleware>)));
        self
    }

    /// Replaces the whole chain.
    pub fn set_handlers<I, M>(mut self, handlers: I) -> Self
    where
        I: IntoIterator<Item = Option<M>>,
        M: Middleware + 'static,
    {
        self.handlers.clear();
        self.add_handlers(handlers)
    }

    /// Installs a wrapper, enabling wrapper support.
    pub fn wrapper<W: RequestWrapper + 'static>(mut self, wrapper: W) -> Self {
        self.wrappers.get_or_insert_with(Vec::new).push(Box::new(wrapper));
        self
    }

    /// Installs wrappers, enabling wrapper support even when `wrappers` is empty.
    pub fn add_wrappers<I, W>(mut self, wrappers: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: RequestWrapper + 'static,
    {
        let installed = self.wrappers.get_or_insert_with(Vec::new);
        installed.extend(wrappers.into_iter().map(|w| Box::new(w) as Box<dyn RequestWrapper>));
        self
    }

    /// Replaces every installed wrapper, enabling wrapper support even when `wrappers` is empty.
    pub fn set_wrappers<I, W>(mut self, wrappers: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: RequestWrapper + 'static,
    {
        self.wrappers = Some(Vec::new());
        self.add_wrappers(wrappers)
    }

    pub async fn call<B>(&self, raw: http::Request<B>) -> http::Response<ResponseBody>
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        self.serve(Some(raw)).await
    }

    /// Runs the chain for `raw`. A missing request is answered through the error path.
    pub async fn serve<B>(&self, raw: Option<http::Request<B>>) -> http::Response<ResponseBody>
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let mut request = match Request::new(raw) {
            Ok(request) => request,
            Err(e) => {
                warn!(cause = %e, "failed to wrap request");
                return self.write_error(&e.shared(), None, Response::new());
            }
        };

        if let Some(wrappers) = &self.wrappers {
            for wrapper in wrappers {
                wrapper.on_request(&mut request).await;
            }
        }

        let mut produced = None;
        for (index, middleware) in self.handlers.iter().enumerate() {
            let Some(middleware) = middleware else {
                continue;
            };

            trace!(index, "invoking middleware");
            produced = middleware.handle(&mut request).await;
            if produced.is_some() {
                break;
            }
        }

        let mut response = match (produced, &self.wrappers) {
            (Some(response), _) => response,
            (None, Some(_)) => Response::new(),
            (None, None) => {
                return self.write_error(&AdapterError::NoHandlers.shared(), Some(&request), Response::new());
            }
        };

        if let Some(wrappers) = &self.wrappers {
            for wrapper in wrappers.iter().rev() {
                wrapper.on_response(&request, &mut response).await;
            }
        }

        if let Some(error) = response.error().map(Arc::clone) {
            self.write_error(&error, Some(&request), response)
        } else if response.body().is_none() {
            self.write_empty(&request, response)
        } else {
            self.write_body(&request, response)
        }
    }

    fn write_error(&self, error: &SharedError, req: Option<&Request>, mut res: Response) -> http::Response<ResponseBody> {
        debug!(cause = %error, "writing error response");
        let bytes = match &self.error_serializer {
            Some(error_serializer) => error_serializer.serialize(error, req, &mut res),
            None => Bytes::new(),
        };
        self.write(res, ResponseBody::once(bytes))
    }

    fn write_empty(&self, req: &Request, mut res: Response) -> http::Response<ResponseBody> {
        debug!("writing empty response");
        let bytes = self.empty_handler.as_ref().and_then(|empty_handler| empty_handler.handle(req, &mut res));
        self.write(res, ResponseBody::from(bytes))
    }

    fn write_body(&self, req: &Request, mut res: Response) -> http::Response<ResponseBody> {
        let body = match &self.mode {
            Mode::Buffered(serializer) => {
                let serialized = match (serializer, res.body()) {
                    (Some(serializer), Some(payload)) => serializer.serialize(payload),
                    (Some(_), None) => Ok(Bytes::new()),
                    (None, _) => Err(SerializeError::Missing.into()),
                };

                match serialized {
                    Ok(bytes) => ResponseBody::once(bytes),
                    Err(e) => {
                        warn!(cause = %e, uri = %req.uri(), "failed to serialize response body");
                        return self.write_error(&Arc::from(e), Some(req), res);
                    }
                }
            }
            Mode::Streaming => match res.take_body() {
                Some(payload) => stream_payload(payload),
                None => return self.write_empty(req, res),
            },
        };

        debug!(stream = body.is_stream(), "writing response body");
        let callbacks = res.take_callbacks();
        self.write(res, body.with_callbacks(callbacks))
    }

    fn write(&self, res: Response, body: ResponseBody) -> http::Response<ResponseBody> {
        let (code, mut headers) = res.into_head();
        if let Some(content_type) = &self.content_type
            && !headers.contains_key(CONTENT_TYPE)
        {
            headers.insert(CONTENT_TYPE, content_type.clone());
        }

        let mut response = http::Response::new(body);
        *response.status_mut() = code;
        *response.headers_mut() = headers;
        response
    }
}

fn stream_payload(payload: Payload) -> ResponseBody {
    match payload {
        Payload::Stream(body) => body,
        Payload::Text(text) => ResponseBody::from(text),
        Payload::Bytes(bytes) => ResponseBody::once(bytes),
        Payload::Value(value) => ResponseBody::from(format!("{value:?}")),
    }
}

impl Default for Adapter {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("content_type", &self.content_type)
            .field("streaming", &matches!(self.mode, Mode::Streaming))
            .field("handlers", &self.handlers.len())
            .field("wrappers", &self.wrappers.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}
