//! Error types surfaced by request execution.

use axum::http::StatusCode;
use thiserror::Error;

use crate::net::TransportError;

/// Boxed error used for transport causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by [`RequestExecutor::execute`](crate::http::RequestExecutor::execute).
///
/// Server 5xx responses and connectivity failures are not errors; they are
/// reported as [`Outcome`](crate::http::Outcome) variants so a retry layer
/// can act on them.
#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be built from the node and configuration.
    #[error("invalid request configuration: {0}")]
    Configuration(String),

    /// The server answered with a 4xx status.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Reading the body of a 4xx response failed.
    #[error("failed to read error response body: {0}")]
    ErrorBody(#[source] axum::Error),

    /// Any other failure while sending the request or awaiting the response.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for request execution.
pub type Result<T> = std::result::Result<T, Error>;

/// Error reported by the server for a 4xx response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Code: {code}. {message} (HTTP {status})")]
pub struct ServerError {
    /// Value of `X-ClickHouse-Exception-Code`, or 0 when absent.
    pub code: i32,
    /// Response body text.
    pub message: String,
    pub status: StatusCode,
}
