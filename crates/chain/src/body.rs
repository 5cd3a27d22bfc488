//! The outgoing body produced by the [`Adapter`](crate::Adapter).
//!
//! Buffered adapters always emit a single chunk (or nothing at all); the streaming adapter may
//! pass a boxed `http_body::Body` through untouched.
//!
//! Response callbacks travel with the body and run once the transport has read it to the end.

use crate::error::BoxError;
use crate::response::Callback;
use bytes::Bytes;
use http_body::Body as HttpBody;
use http_body::{Frame, SizeHint};
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tracing::debug;

pub struct ResponseBody {
    inner: Kind,
    // run when the last frame has been read
    callbacks: Vec<Callback>,
}

enum Kind {
    Once(Option<Bytes>),
    Stream(UnsyncBoxBody<Bytes, BoxError>),
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { inner: Kind::Once(None), callbacks: Vec::new() }
    }

    pub fn once(bytes: Bytes) -> Self {
        if bytes.is_empty() { Self::empty() } else { Self { inner: Kind::Once(Some(bytes)), callbacks: Vec::new() } }
    }

    pub fn stream<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self { inner: Kind::Stream(body.map_err(Into::into).boxed_unsync()), callbacks: Vec::new() }
    }

    pub(crate) fn is_stream(&self) -> bool {
        matches!(self.inner, Kind::Stream(_))
    }

    /// Attaches callbacks fired once the body has been read to the end.
    pub(crate) fn with_callbacks(mut self, callbacks: Vec<Callback>) -> Self {
        self.callbacks.extend(callbacks);
        self
    }

    fn complete(&mut self) {
        let callbacks = std::mem::take(&mut self.callbacks);
        if callbacks.is_empty() {
            return;
        }

        if let Ok(handle) = Handle::try_current() {
            for callback in callbacks {
                handle.spawn(async move { callback() });
            }
        } else {
            debug!("no tokio runtime, running response callbacks inline");
            for callback in callbacks {
                callback();
            }
        }
    }
}

impl Drop for ResponseBody {
    fn drop(&mut self) {
        // the transport may stop polling as soon as the body reports its end
        if self.is_end_stream() {
            self.complete();
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Kind::Once(bytes) => f.debug_tuple("ResponseBody::Once").field(bytes).finish(),
            Kind::Stream(_) => f.write_str("ResponseBody::Stream"),
        }
    }
}

impl Default for ResponseBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        Self::once(bytes)
    }
}

impl From<Option<Bytes>> for ResponseBody {
    fn from(option: Option<Bytes>) -> Self {
        match option {
            Some(bytes) => Self::once(bytes),
            None => Self::empty(),
        }
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        Self::once(Bytes::from(value))
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        Self::once(Bytes::from_static(value.as_bytes()))
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = match &mut this.inner {
            Kind::Once(bytes) => Poll::Ready(bytes.take().map(|b| Ok(Frame::data(b)))),
            Kind::Stream(box_body) => Pin::new(box_body).poll_frame(cx),
        };

        if let Poll::Ready(None) = polled {
            this.complete();
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Kind::Once(bytes) => bytes.is_none(),
            Kind::Stream(box_body) => box_body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Kind::Once(None) => SizeHint::with_exact(0),
            Kind::Once(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Kind::Stream(box_body) => box_body.size_hint(),
        }
    }
}
