//! Hooks run around the middleware chain.
//!
//! Installing any wrapper on an [`Adapter`](crate::Adapter) switches it to the wrapped policy:
//! request hooks run in registration order before the chain, response hooks run in reverse
//! order after it, and a chain that produces nothing yields a default `200 OK` response
//! instead of an error.

mod date;
mod trace;

use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;

pub use date::DateWrapper;
pub use trace::{Started, TraceWrapper};

#[async_trait]
pub trait RequestWrapper: Send + Sync {
    async fn on_request(&self, _req: &mut Request) {}

    async fn on_response(&self, _req: &Request, _res: &mut Response) {}
}

#[async_trait]
impl<W: RequestWrapper + ?Sized> RequestWrapper for Box<W> {
    async fn on_request(&self, req: &mut Request) {
        (**self).on_request(req).await;
    }

    async fn on_response(&self, req: &Request, res: &mut Response) {
        (**self).on_response(req, res).await;
    }
}
