use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// A link in the [`Adapter`](crate::Adapter)'s middleware chain.
///
/// Returning `Some` tells the adapter that the request has been handled: the chain stops and
/// the response is written. Returning `None` passes the request on to the next middleware.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: &mut Request) -> Option<Response>;
}

#[async_trait]
impl<M: Middleware + ?Sized> Middleware for Box<M> {
    async fn handle(&self, req: &mut Request) -> Option<Response> {
        (**self).handle(req).await
    }
}

#[async_trait]
impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    async fn handle(&self, req: &mut Request) -> Option<Response> {
        (**self).handle(req).await
    }
}

/// a [`Middleware`] backed by a plain function, see [`middleware_fn`]
pub struct MiddlewareFn<F> {
    f: F,
}

/// Turns a synchronous function into a [`Middleware`].
///
/// ```
/// # use micro_chain::{middleware_fn, Response};
/// # use http::StatusCode;
/// let no_content = middleware_fn(|_req| {
///     let mut response = Response::new();
///     response.set_code(StatusCode::NO_CONTENT);
///     Some(response)
/// });
/// ```
pub fn middleware_fn<F>(f: F) -> MiddlewareFn<F>
where
    F: Fn(&mut Request) -> Option<Response> + Send + Sync,
{
    MiddlewareFn { f }
}

#[async_trait]
impl<F> Middleware for MiddlewareFn<F>
where
    F: Fn(&mut Request) -> Option<Response> + Send + Sync,
{
    async fn handle(&self, req: &mut Request) -> Option<Response> {
        (self.f)(req)
    }
}

impl<F> fmt::Debug for MiddlewareFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareFn").finish_non_exhaustive()
    }
}

/// Produces the bytes written for a response that carries neither body nor error.
///
/// The handler may adjust the response status and headers before they are written.
pub trait EmptyHandler: Send + Sync {
    fn handle(&self, req: &Request, res: &mut Response) -> Option<Bytes>;
}

impl<F> EmptyHandler for F
where
    F: Fn(&Request, &mut Response) -> Option<Bytes> + Send + Sync,
{
    fn handle(&self, req: &Request, res: &mut Response) -> Option<Bytes> {
        (self)(req, res)
    }
}

/// writes nothing for empty responses
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEmptyHandler;

impl EmptyHandler for DefaultEmptyHandler {
    #[inline]
    fn handle(&self, _req: &Request, _res: &mut Response) -> Option<Bytes> {
        None
    }
}
