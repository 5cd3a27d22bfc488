//! Encoders turning a [`Payload`] or an error into the bytes written by the
//! [`Adapter`](crate::Adapter).

use crate::error::{BoxError, SerializeError, SharedError};
use crate::request::Request;
use crate::response::{Payload, Response, Value};
use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;

/// Encodes a response body.
#[cfg_attr(test, mockall::automock)]
pub trait Serializer: Send + Sync {
    fn serialize(&self, body: &Payload) -> Result<Bytes, BoxError>;
}

impl<F> Serializer for F
where
    F: Fn(&Payload) -> Result<Bytes, BoxError> + Send + Sync,
{
    fn serialize(&self, body: &Payload) -> Result<Bytes, BoxError> {
        (self)(body)
    }
}

/// Encodes a response error.
///
/// Invoked with the request when one could be wrapped. Error serializers can't fail, and may
/// change the response status and headers before they are written.
pub trait ErrorSerializer: Send + Sync {
    fn serialize(&self, error: &SharedError, req: Option<&Request>, res: &mut Response) -> Bytes;
}

impl<F> ErrorSerializer for F
where
    F: Fn(&SharedError, Option<&Request>, &mut Response) -> Bytes + Send + Sync,
{
    fn serialize(&self, error: &SharedError, req: Option<&Request>, res: &mut Response) -> Bytes {
        (self)(error, req, res)
    }
}

/// Encodes bodies as JSON. Text becomes a JSON string and raw bytes a JSON array.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, body: &Payload) -> Result<Bytes, BoxError> {
        let encoded = match body {
            Payload::Text(text) => serde_json::to_vec(text),
            Payload::Bytes(bytes) => serde_json::to_vec(bytes.as_ref()),
            Payload::Value(value) => serde_json::to_vec(value),
            Payload::Stream(_) => return Err(SerializeError::Stream.into()),
        };

        Ok(Bytes::from(encoded.map_err(SerializeError::from)?))
    }
}

/// Encodes bodies as XML through `serde-xml-rs`.
///
/// Structs and maps become the document element. Anything else, such as text or a sequence,
/// is nested in a `<response>` element with one `<item>` per value.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlSerializer;

#[derive(Serialize)]
#[serde(rename = "response")]
struct XmlRoot<'a> {
    item: &'a dyn Value,
}

impl Serializer for XmlSerializer {
    fn serialize(&self, body: &Payload) -> Result<Bytes, BoxError> {
        let encoded = match body {
            Payload::Text(text) => serde_xml_rs::to_string(&XmlRoot { item: text }),
            Payload::Bytes(bytes) => serde_xml_rs::to_string(&XmlRoot { item: &bytes.as_ref() }),
            Payload::Value(value) if is_element(&**value) => serde_xml_rs::to_string(value),
            Payload::Value(value) => serde_xml_rs::to_string(&XmlRoot { item: &**value }),
            Payload::Stream(_) => return Err(SerializeError::Stream.into()),
        };

        Ok(Bytes::from(encoded.map_err(SerializeError::from)?))
    }
}

// values json can't represent are left for serde-xml-rs to judge
fn is_element(value: &dyn Value) -> bool {
    matches!(serde_json::to_value(value), Ok(serde_json::Value::Object(_)) | Err(_))
}

/// Sets `500 Internal Server Error` and writes `{"error":"<message>"}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultJsonErrorSerializer;

impl ErrorSerializer for DefaultJsonErrorSerializer {
    fn serialize(&self, error: &SharedError, _req: Option<&Request>, res: &mut Response) -> Bytes {
        res.set_code(StatusCode::INTERNAL_SERVER_ERROR);
        let message = serde_json::Value::String(error.to_string());
        Bytes::from(format!(r#"{{"error":{message}}}"#))
    }
}

/// Sets `500 Internal Server Error` and writes an XML document with a single `error` element.
///
/// The message is written as-is, markup in it is not escaped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultXmlErrorSerializer;

impl ErrorSerializer for DefaultXmlErrorSerializer {
    fn serialize(&self, error: &SharedError, _req: Option<&Request>, res: &mut Response) -> Bytes {
        res.set_code(StatusCode::INTERNAL_SERVER_ERROR);
        Bytes::from(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<error>{error}</error>"))
    }
}
