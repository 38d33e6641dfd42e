//! Connection pool settings.
//!
//! # Responsibilities
//! - Translate registry properties into connector and pool settings
//! - Keep unparseable values from breaking client construction
//! - Size the connection lease limit from `max_open_connections`
//!
//! # Design Decisions
//! - Invalid numbers are logged and treated as unset
//! - `connection_reuse_strategy` is accepted but hyper's pool always reuses
//!   the most recently returned connection

use std::time::Duration;

use crate::config::{ClientConfig, Property};

/// Idle time before a TCP keep-alive probe when `socket_keepalive` is on.
const TCP_KEEPALIVE_IDLE: Duration = Duration::from_secs(60);

/// Settings applied to the pooled HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Requests allowed in flight at once. Zero means no limit.
    pub max_open_connections: usize,
    /// Maximum idle connections kept per host. Zero disables pooling.
    pub max_idle_per_host: usize,
    /// Idle connections are closed after this long.
    pub idle_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub tcp_nodelay: bool,
    pub tcp_keepalive: Option<Duration>,
    pub send_buffer_size: Option<usize>,
    pub recv_buffer_size: Option<usize>,
    pub reuse_address: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl PoolOptions {
    /// Build pool settings from the client configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        if config.get_property(Property::ConnectionReuseStrategy) == Some("LIFO") {
            tracing::debug!("LIFO connection reuse requested; pool order is managed by hyper");
        }

        let max_open_connections = number(config, Property::HttpMaxOpenConnections).unwrap_or(10);
        let pool_enabled = flag(config, Property::ConnectionPoolEnabled);

        Self {
            max_open_connections,
            max_idle_per_host: if pool_enabled { max_open_connections } else { 0 },
            idle_timeout: number(config, Property::HttpKeepAliveTimeout).map(Duration::from_millis),
            connect_timeout: number(config, Property::ConnectionTimeout).map(Duration::from_millis),
            tcp_nodelay: flag(config, Property::SocketTcpNoDelay),
            tcp_keepalive: flag(config, Property::SocketKeepAlive).then_some(TCP_KEEPALIVE_IDLE),
            send_buffer_size: number(config, Property::SocketSndbuf),
            recv_buffer_size: number(config, Property::SocketRcvbuf),
            reuse_address: flag(config, Property::SocketReuseAddr),
        }
    }
}

fn number<T: std::str::FromStr>(config: &ClientConfig, property: Property) -> Option<T> {
    let raw = config.get_property(property)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key = %property, value = %raw, "Ignoring non-numeric pool setting");
            None
        }
    }
}

fn flag(config: &ClientConfig, property: Property) -> bool {
    config
        .get_property(property)
        .is_some_and(crate::config::schema::is_truthy)
}
