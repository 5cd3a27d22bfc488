use crate::request::Request;
use crate::response::Response;
use crate::wrapper::RequestWrapper;
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, info, trace};

/// Logs every request passing through the adapter, together with its status and latency.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceWrapper;

/// when the request entered the chain, stored in the request context
#[derive(Debug, Clone, Copy)]
pub struct Started(pub Instant);

#[async_trait]
impl RequestWrapper for TraceWrapper {
    async fn on_request(&self, req: &mut Request) {
        debug!(method = %req.method(), uri = %req.uri(), "request received");
        req.context_mut().insert(Started(Instant::now()));
    }

    async fn on_response(&self, req: &Request, res: &mut Response) {
        let elapsed = req.context().get::<Started>().map(|started| started.0.elapsed());

        info!(
            method = %req.method(),
            uri = %req.uri(),
            status = res.code().as_u16(),
            failed = res.error().is_some(),
            elapsed = ?elapsed,
            "request handled"
        );

        let uri = req.uri().clone();
        res.callback(move || trace!(%uri, "response body written"));
    }
}
