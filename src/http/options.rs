//! Request-scoped transport options.

use std::time::Duration;

use crate::config::{ClientConfig, Property, RequestSettings};

/// Options the transport applies to a single request.
///
/// The executor keeps one base copy built from the client configuration and
/// derives a fresh copy per call, so overrides never leak between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestOptions {
    /// Bound on the wait for a connection lease. The request itself has no deadline.
    pub connection_request_timeout: Option<Duration>,
}

impl RequestOptions {
    /// Base options for a client.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            connection_request_timeout: config
                .get_property(Property::ConnectionRequestTimeout)
                .and_then(parse_timeout),
        }
    }

    /// Copy of these options with the call's overrides applied.
    pub fn overlay(&self, overrides: &RequestSettings) -> Self {
        let mut options = *self;
        if let Some(raw) = overrides.get_property(Property::ConnectionRequestTimeout) {
            options.connection_request_timeout = parse_timeout(raw);
        }
        options
    }
}

/// Milliseconds; zero or negative means no limit.
fn parse_timeout(raw: &str) -> Option<Duration> {
    match raw.trim().parse::<i64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms as u64)),
        Ok(_) => None,
        Err(_) => {
            tracing::warn!(value = %raw, "Ignoring non-numeric connection_request_timeout");
            None
        }
    }
}
