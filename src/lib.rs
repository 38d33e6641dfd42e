//! ClickHouse HTTP request execution.
//!
//! A typed configuration registry plus a request executor that turns a
//! configuration, per-call overrides and a streamed body into one HTTP
//! round-trip against a ClickHouse node, classifying the result.

pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::{ClientConfig, ConfigError, Property, RequestSettings};
pub use error::{Error, Result, ServerError};
pub use http::{payload, BodySink, BodyWriter, ClosedResponse, Outcome, RequestExecutor, ServerResponse};
pub use net::{ConnectivityFailure, ConnectivityKind, HyperTransport, Node, Transport, TransportError};
pub use resilience::{Backoff, FaultCause, RetryPolicy};
