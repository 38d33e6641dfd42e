//! Response handling.
//!
//! # Responsibilities
//! - Wrap successful responses without touching the body
//! - Drain and decode 4xx error bodies into [`ServerError`]
//! - Close 5xx responses without reading them
//!
//! # Design Decisions
//! - Only the 4xx path buffers a body; the buffer size is a capacity hint
//! - Dropping the body is how a response is closed

use axum::body::{Body, BodyDataStream};
use axum::http::{HeaderMap, Response, StatusCode};
use bytes::BytesMut;
use futures_util::StreamExt;

use crate::error::{Error, Result, ServerError};
use crate::net::ConnectivityFailure;

pub const HEADER_EXCEPTION_CODE: &str = "x-clickhouse-exception-code";
pub const HEADER_QUERY_ID: &str = "x-clickhouse-query-id";
pub const HEADER_SUMMARY: &str = "x-clickhouse-summary";

/// Initial capacity for error bodies. Not a limit.
const ERROR_BODY_BUFFER_SIZE: usize = 1024;

/// Result of a request that did not fail locally.
#[derive(Debug)]
pub enum Outcome {
    /// Status below 400. The body is open and unread; the caller owns it.
    Success(ServerResponse),
    /// Status 500 or above. The response was closed without reading the body.
    ServerUnavailable(ClosedResponse),
    /// The node could not be reached. Another node may be tried.
    Unreachable(ConnectivityFailure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// The open response, if the request succeeded.
    pub fn into_response(self) -> Option<ServerResponse> {
        match self {
            Outcome::Success(response) => Some(response),
            _ => None,
        }
    }
}

/// Open response from the server.
#[derive(Debug)]
pub struct ServerResponse {
    inner: Response<Body>,
}

impl ServerResponse {
    pub(crate) fn new(inner: Response<Body>) -> Self {
        Self { inner }
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Query id assigned by the server.
    pub fn query_id(&self) -> Option<&str> {
        self.header(HEADER_QUERY_ID)
    }

    /// Raw `X-ClickHouse-Summary` JSON.
    pub fn summary(&self) -> Option<&str> {
        self.header(HEADER_SUMMARY)
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers().get(name).and_then(|v| v.to_str().ok())
    }

    pub fn into_body(self) -> Body {
        self.inner.into_body()
    }

    /// Body as a stream of chunks.
    pub fn into_data_stream(self) -> BodyDataStream {
        self.inner.into_body().into_data_stream()
    }

    pub fn into_inner(self) -> Response<Body> {
        self.inner
    }
}

/// Status and headers of a response whose body was discarded.
#[derive(Debug, Clone)]
pub struct ClosedResponse {
    status: StatusCode,
    headers: HeaderMap,
}

impl ClosedResponse {
    /// Close `response`, dropping its body unread.
    pub(crate) fn close(response: Response<Body>) -> Self {
        let (parts, body) = response.into_parts();
        drop(body);
        Self {
            status: parts.status,
            headers: parts.headers,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Server exception code, if the server sent one.
    pub fn exception_code(&self) -> i32 {
        exception_code(&self.headers)
    }
}

/// `X-ClickHouse-Exception-Code`, or 0 when absent or not a number.
pub fn exception_code(headers: &HeaderMap) -> i32 {
    headers
        .get(HEADER_EXCEPTION_CODE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Drain a 4xx response into a [`ServerError`]. The response is consumed.
pub(crate) async fn read_server_error(response: Response<Body>) -> Result<ServerError> {
    let (parts, body) = response.into_parts();
    let code = exception_code(&parts.headers);

    let mut buffer = BytesMut::with_capacity(ERROR_BODY_BUFFER_SIZE);
    let mut chunks = body.into_data_stream();
    while let Some(chunk) = chunks.next().await {
        buffer.extend_from_slice(&chunk.map_err(Error::ErrorBody)?);
    }

    Ok(ServerError {
        code,
        message: String::from_utf8_lossy(&buffer).into_owned(),
        status: parts.status,
    })
}
