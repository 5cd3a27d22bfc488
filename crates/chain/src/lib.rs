//! An async middleware chain on top of the `http` crate types.
//!
//! An [`Adapter`] owns an ordered list of [`Middleware`]. Each call wraps the raw
//! `http::Request` into a [`Request`], runs the middleware in order until one of them
//! returns a [`Response`], and writes that response as an `http::Response<ResponseBody>`
//! using the adapter's serializers.

mod adapter;
mod body;
mod date;
mod error;
mod handler;
mod request;
mod response;
mod serialize;

pub mod processor;
pub mod wrapper;

pub use adapter::Adapter;
pub use body::ResponseBody;
pub use date::DateService;
pub use error::AdapterError;
pub use error::BoxError;
pub use error::SerializeError;
pub use error::SharedError;
pub use handler::DefaultEmptyHandler;
pub use handler::EmptyHandler;
pub use handler::Middleware;
pub use handler::MiddlewareFn;
pub use handler::middleware_fn;
pub use request::RawBody;
pub use request::Request;
pub use response::Callback;
pub use response::Payload;
pub use response::Response;
pub use response::Value;
pub use serialize::DefaultJsonErrorSerializer;
pub use serialize::DefaultXmlErrorSerializer;
pub use serialize::ErrorSerializer;
pub use serialize::JsonSerializer;
pub use serialize::Serializer;
pub use serialize::XmlSerializer;
