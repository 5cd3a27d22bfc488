use crate::date::DateService;
use crate::request::Request;
use crate::response::Response;
use crate::wrapper::RequestWrapper;
use async_trait::async_trait;
use http::header::DATE;

/// Adds a `Date` header to responses that don't carry one yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct DateWrapper;

#[async_trait]
impl RequestWrapper for DateWrapper {
    async fn on_response(&self, _req: &Request, res: &mut Response) {
        if res.header(DATE).is_some() {
            return;
        }

        if let Some(date) = DateService::global().http_date() {
            res.set_header(DATE, date);
        }
    }
}
