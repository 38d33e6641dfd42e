//! Request metrics.
//!
//! # Metrics
//! - `clickhouse_http_requests_total{group, outcome}`: executed requests
//! - `clickhouse_http_request_duration_seconds{group, outcome}`: time until
//!   the outcome was known (the response head, or the drained error body)
//!
//! # Design Decisions
//! - Uses the `metrics` facade; no recorder is installed by this crate
//! - Streaming time of successful bodies is not measured here

use std::time::Instant;

use crate::error::{Error, Result};
use crate::http::Outcome;

/// Label for the outcome of one `execute` call.
pub fn outcome_label(result: &Result<Outcome>) -> &'static str {
    match result {
        Ok(Outcome::Success(_)) => "success",
        Ok(Outcome::ServerUnavailable(_)) => "server_unavailable",
        Ok(Outcome::Unreachable(_)) => "unreachable",
        Err(Error::Server(_)) => "server_error",
        Err(Error::ErrorBody(_)) => "error_body",
        Err(Error::Transport(_)) => "transport_error",
        Err(Error::Configuration(_)) => "configuration_error",
    }
}

/// Record a finished `execute` call.
pub fn record_request(group: &str, result: &Result<Outcome>, start: Instant) {
    let outcome = outcome_label(result);

    metrics::counter!(
        "clickhouse_http_requests_total",
        "group" => group.to_string(),
        "outcome" => outcome,
    )
    .increment(1);

    metrics::histogram!(
        "clickhouse_http_request_duration_seconds",
        "group" => group.to_string(),
        "outcome" => outcome,
    )
    .record(start.elapsed().as_secs_f64());
}
