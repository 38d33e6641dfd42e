//! Structured logging.
//!
//! # Responsibilities
//! - Install the `tracing` subscriber for the command-line client
//! - Honor `RUST_LOG`, falling back to a given default directive
//!
//! # Design Decisions
//! - Logs go to stderr so query results on stdout stay clean
//! - A second initialization is ignored instead of panicking

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging. Returns false if a subscriber was already installed.
pub fn init(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice() {
        init("warn");
        assert!(!init("debug"));
    }
}
