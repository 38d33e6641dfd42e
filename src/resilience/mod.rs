//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Failed call or non-success Outcome:
//!     → retries.rs (map to a FaultCause, check the policy)
//!     → backoff.rs (delay before the next attempt)
//!     → caller retries, possibly against another node
//! ```
//!
//! # Design Decisions
//! - The executor never retries; it only reports what happened
//! - Policies come from the same configuration the executor reads

pub mod backoff;
pub mod retries;

pub use backoff::Backoff;
pub use retries::{FaultCause, RetryPolicy};
