//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! RequestExecutor::execute
//!     → tracing span per client (group field) with per-request events
//!     → metrics.rs (request counter and latency histogram by outcome)
//!
//! Binary startup:
//!     → logging.rs (tracing-subscriber with an env filter)
//! ```
//!
//! # Design Decisions
//! - The library only emits; installing a subscriber or recorder is the
//!   embedding application's job
//! - Metric labels use the configured metrics group name

pub mod logging;
pub mod metrics;
