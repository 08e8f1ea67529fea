//! An HTTP server that reports back what it received.
//!
//! Any request to an unrouted path is answered with `200 OK` and an
//! `EchoedRequest` JSON body describing the method, path, query, headers and
//! body exactly as they arrived. Two helper routes shape the response:
//!
//! - `/status/{code}` answers with that status code.
//! - `/delay/{ms}` waits `ms` milliseconds, then echoes.

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::Path,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::debug;

/// Everything the server saw of one request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoedRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl EchoedRequest {
    /// Every value received for `name`. Header names arrive lowercased.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

pub fn app() -> Router {
    Router::new()
        .route("/status/{code}", any(status))
        .route("/delay/{ms}", any(delay))
        .fallback(echo)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<EchoedRequest> {
    Json(describe(method, uri, headers, body))
}

async fn status(
    Path(code): Path<u16>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Ok(code) = StatusCode::from_u16(code) else {
        return (StatusCode::BAD_REQUEST, "not a status code").into_response();
    };
    (code, Json(describe(method, uri, headers, body))).into_response()
}

async fn delay(
    Path(ms): Path<u64>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<EchoedRequest> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(describe(method, uri, headers, body))
}

fn describe(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> EchoedRequest {
    let echoed = EchoedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().unwrap_or_default().to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    debug!(method = %echoed.method, path = %echoed.path, query = %echoed.query, "echoing request");
    echoed
}
