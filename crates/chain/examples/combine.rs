//! Serves `POST /combine`, joining every `start` string with every `end` string.
//!
//! ```text
//! curl -X POST -d '{"start":["a","b"],"end":["1","2"]}' http://127.0.0.1:8080/combine
//! curl -X POST -d '{"start":["a","b"],"end":["1","2"]}' 'http://127.0.0.1:8080/combine?xml'
//! ```

use async_trait::async_trait;
use http::{HeaderName, HeaderValue, Method, StatusCode};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use micro_chain::wrapper::{DateWrapper, TraceWrapper};
use micro_chain::{Adapter, Middleware, Payload, Request, Response, ResponseBody, processor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Deserialize, Debug)]
struct CombineRequest {
    start: Vec<String>,
    end: Vec<String>,
}

#[derive(Serialize, Debug)]
struct CombineResponse {
    #[serde(rename = "combo")]
    combos: Vec<String>,
}

/// Rejects bodies that aren't an object with `start` and `end` string arrays.
struct Validator;

#[async_trait]
impl Middleware for Validator {
    async fn handle(&self, req: &mut Request) -> Option<Response> {
        let mut document: Option<Value> = None;
        req.process_body(Some(processor::json(&mut document))).await;

        if let Some(error) = req.error() {
            return Some(Response::make_error(StatusCode::INTERNAL_SERVER_ERROR, Arc::clone(error)));
        }

        let problems = document.as_ref().map(validate).unwrap_or_default();
        if problems.is_empty() { None } else { Some(Response::make(StatusCode::BAD_REQUEST, Payload::value(problems))) }
    }
}

fn validate(document: &Value) -> Vec<String> {
    let mut problems = Vec::new();
    if !document.is_object() {
        problems.push("(root): Invalid type. Expected: object".to_owned());
        return problems;
    }

    for field in ["start", "end"] {
        match document.get(field) {
            None => problems.push(format!("(root): {field} is required")),
            Some(Value::Array(items)) if items.iter().all(Value::is_string) => {}
            Some(_) => problems.push(format!("{field}: Invalid type. Expected: array of strings")),
        }
    }
    problems
}

struct Controller;

#[async_trait]
impl Middleware for Controller {
    async fn handle(&self, req: &mut Request) -> Option<Response> {
        let mut input: Option<CombineRequest> = None;
        req.process_body(Some(processor::json(&mut input))).await;

        if let Some(error) = req.error() {
            return Some(Response::make_error(StatusCode::INTERNAL_SERVER_ERROR, Arc::clone(error)));
        }

        let input = input?;
        let combos = input
            .start
            .iter()
            .flat_map(|prefix| input.end.iter().map(move |suffix| format!("{prefix}{suffix}")))
            .collect();

        let mut response = Response::make(StatusCode::OK, Payload::value(CombineResponse { combos }));
        response.set_header(HeaderName::from_static("custom-header"), HeaderValue::from_static("some value"));
        Some(response)
    }
}

struct Routes {
    json: Adapter,
    xml: Adapter,
}

impl Routes {
    fn new() -> Self {
        Self { json: combine(Adapter::json()), xml: combine(Adapter::xml()) }
    }

    async fn route(&self, req: http::Request<Incoming>) -> http::Response<ResponseBody> {
        if req.uri().path() != "/combine" {
            return status(StatusCode::NOT_FOUND);
        }
        if req.method() != Method::POST {
            return status(StatusCode::METHOD_NOT_ALLOWED);
        }

        let wants_xml =
            req.uri().query().is_some_and(|query| query.split('&').any(|pair| pair.split('=').next() == Some("xml")));

        if wants_xml { self.xml.call(req).await } else { self.json.call(req).await }
    }
}

fn combine(adapter: Adapter) -> Adapter {
    adapter.wrapper(TraceWrapper).wrapper(DateWrapper).handler(Validator).handler(Controller)
}

fn status(code: StatusCode) -> http::Response<ResponseBody> {
    let mut response = http::Response::new(ResponseBody::empty());
    *response.status_mut() = code;
    response
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let address = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:8080".to_owned());

    info!(%address, "start listening");
    let tcp_listener = match TcpListener::bind(&address).await {
        Ok(tcp_listener) => tcp_listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    let routes = Arc::new(Routes::new());
    loop {
        let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let routes = Arc::clone(&routes);
        tokio::spawn(async move {
            let service = service_fn(move |req: http::Request<Incoming>| {
                let routes = Arc::clone(&routes);
                async move { Ok::<_, Infallible>(routes.route(req).await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(TokioIo::new(tcp_stream), service).await {
                error!(cause = %e, %remote_addr, "connection error");
            }
        });
    }
}
