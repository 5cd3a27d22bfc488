//! Units of work run against the request body through [`Request::process_body`].
//!
//! [`Request::process_body`]: crate::Request::process_body

use crate::error::BoxError;
use serde::de::DeserializeOwned;

pub trait BodyProcessor {
    /// Processes the request body bytes. A returned error becomes the request's sticky error.
    fn process(&mut self, body: &[u8]) -> Result<(), BoxError>;
}

impl<F, E> BodyProcessor for F
where
    F: FnMut(&[u8]) -> Result<(), E>,
    E: Into<BoxError>,
{
    fn process(&mut self, body: &[u8]) -> Result<(), BoxError> {
        (self)(body).map_err(Into::into)
    }
}

/// Deserializes a JSON body into `slot`.
///
/// ```
/// # use micro_chain::processor;
/// # use micro_chain::processor::BodyProcessor;
/// let mut numbers: Option<Vec<u32>> = None;
/// processor::json(&mut numbers).process(b"[1, 2, 3]").unwrap();
/// assert_eq!(numbers, Some(vec![1, 2, 3]));
/// ```
pub fn json<T: DeserializeOwned>(slot: &mut Option<T>) -> impl BodyProcessor + '_ {
    move |body: &[u8]| -> Result<(), BoxError> {
        *slot = Some(serde_json::from_slice(body)?);
        Ok(())
    }
}

/// Deserializes an `application/x-www-form-urlencoded` body into `slot`.
pub fn form<T: DeserializeOwned>(slot: &mut Option<T>) -> impl BodyProcessor + '_ {
    move |body: &[u8]| -> Result<(), BoxError> {
        *slot = Some(serde_urlencoded::from_bytes(body)?);
        Ok(())
    }
}
