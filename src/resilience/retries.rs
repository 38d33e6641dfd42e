//! Retry policy.
//!
//! # Responsibilities
//! - Parse the retry count and retryable fault causes from configuration
//! - Map errors and outcomes to a [`FaultCause`]
//! - Answer "may this attempt be retried" for a caller-side retry loop
//!
//! # Design Decisions
//! - Nothing here sends requests; retries are executed by the caller
//! - 4xx responses are retried only for the server codes known to be transient

use std::fmt;
use std::str::FromStr;

use crate::config::keys::decode_list;
use crate::config::{ClientConfig, ConfigError, Property};
use crate::error::Error;
use crate::http::Outcome;
use crate::net::TransportError;

/// Server exception codes that signal a transient condition.
const RETRYABLE_SERVER_CODES: &[i32] = &[
    202, // TOO_MANY_SIMULTANEOUS_QUERIES
    203, // NO_FREE_CONNECTION
    209, // SOCKET_TIMEOUT
    210, // NETWORK_ERROR
];

/// Named category of failure used to decide retry eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCause {
    /// No response was received (connection lost, node unreachable).
    NoHttpResponse,
    ConnectTimeout,
    ConnectionRequestTimeout,
    /// The server reported a transient failure.
    ServerRetryable,
}

impl FaultCause {
    pub const ALL: &'static [FaultCause] = &[
        FaultCause::NoHttpResponse,
        FaultCause::ConnectTimeout,
        FaultCause::ConnectionRequestTimeout,
        FaultCause::ServerRetryable,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FaultCause::NoHttpResponse => "NoHttpResponse",
            FaultCause::ConnectTimeout => "ConnectTimeout",
            FaultCause::ConnectionRequestTimeout => "ConnectionRequestTimeout",
            FaultCause::ServerRetryable => "ServerRetryable",
        }
    }

    /// Fault cause of a failed call, if it is one a retry could fix.
    pub fn of_error(err: &Error) -> Option<FaultCause> {
        match err {
            Error::Transport(TransportError::Timeout(_)) => Some(FaultCause::ConnectionRequestTimeout),
            Error::Transport(TransportError::ConnectTimeout { .. }) => Some(FaultCause::ConnectTimeout),
            Error::Transport(TransportError::Unreachable(_) | TransportError::Request(_)) => {
                Some(FaultCause::NoHttpResponse)
            }
            Error::Server(e) if RETRYABLE_SERVER_CODES.contains(&e.code) => {
                Some(FaultCause::ServerRetryable)
            }
            Error::Server(_) | Error::ErrorBody(_) | Error::Configuration(_) => None,
        }
    }

    /// Fault cause of a non-successful outcome.
    pub fn of_outcome(outcome: &Outcome) -> Option<FaultCause> {
        match outcome {
            Outcome::Success(_) => None,
            Outcome::ServerUnavailable(_) => Some(FaultCause::ServerRetryable),
            Outcome::Unreachable(_) => Some(FaultCause::NoHttpResponse),
        }
    }
}

impl fmt::Display for FaultCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FaultCause {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FaultCause::ALL
            .iter()
            .copied()
            .find(|cause| cause.name() == s.trim())
            .ok_or_else(|| format!("unknown fault cause '{s}'"))
    }
}

/// Retry settings from `retry` and `client_retry_on_failures`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    retry_on: Vec<FaultCause>,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_on: Vec<FaultCause>) -> Self {
        Self {
            max_retries,
            retry_on,
        }
    }

    /// Read the policy from configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let raw = config.get_property(Property::MaxRetries).unwrap_or("0");
        let max_retries = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: Property::MaxRetries.key().to_string(),
            value: raw.to_string(),
            reason: "expected a non-negative integer".to_string(),
        })?;

        let causes = config
            .get_property(Property::ClientRetryOnFailures)
            .unwrap_or_default();
        let retry_on = decode_list(causes)
            .iter()
            .filter(|name| !name.trim().is_empty())
            .map(|name| {
                name.parse().map_err(|reason| ConfigError::InvalidValue {
                    key: Property::ClientRetryOnFailures.key().to_string(),
                    value: name.clone(),
                    reason,
                })
            })
            .collect::<Result<Vec<FaultCause>, _>>()?;

        Ok(Self::new(max_retries, retry_on))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retries_on(&self, cause: FaultCause) -> bool {
        self.retry_on.contains(&cause)
    }

    /// Whether another attempt is allowed after `retries_done` retries
    /// failed with `cause`.
    pub fn should_retry(&self, retries_done: u32, cause: Option<FaultCause>) -> bool {
        retries_done < self.max_retries && cause.is_some_and(|c| self.retries_on(c))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            3,
            vec![
                FaultCause::NoHttpResponse,
                FaultCause::ConnectTimeout,
                FaultCause::ConnectionRequestTimeout,
                FaultCause::ServerRetryable,
            ],
        )
    }
}
