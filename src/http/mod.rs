//! HTTP request execution subsystem.
//!
//! # Data Flow
//! ```text
//! ClientConfig + RequestSettings
//!     → request.rs (URI, query parameters, headers)
//!     → body.rs (lazy streamed body from the caller's writer)
//!     → options.rs (request-scoped timeout overlay)
//!     → executor.rs (dispatch through the transport, classify status)
//!     → response.rs (open response, closed response or ServerError)
//! ```

pub mod body;
pub mod executor;
pub mod options;
pub mod request;
pub mod response;

pub use body::{payload, streaming_body, BodySink, BodyWriter};
pub use executor::RequestExecutor;
pub use options::RequestOptions;
pub use response::{ClosedResponse, Outcome, ServerResponse};
