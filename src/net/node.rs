//! Server node abstraction.
//!
//! # Responsibilities
//! - Represent a single ClickHouse server endpoint
//! - Pre-compute the base URL requests are built from
//! - Resolve a node from `base_uri` or `host`/`port` configuration

use std::fmt;

use url::Url;

use crate::config::{ClientConfig, Property};
use crate::error::{Error, Result};

/// A single server node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    host: String,
    port: u16,
    /// Pre-calculated base URL; query parameters are appended per request.
    base_url: Url,
}

impl Node {
    /// Node reachable over plain HTTP at `host:port`.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        Self::from_url(&format!("http://{host}:{port}/"))
    }

    /// Node from a full base URL such as `http://ch-1:8123/`.
    pub fn from_url(base: &str) -> Result<Self> {
        let base_url = Url::parse(base)
            .map_err(|e| Error::Configuration(format!("invalid base URI '{base}': {e}")))?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::Configuration(format!(
                "unsupported scheme '{}' in '{base}'",
                base_url.scheme()
            )));
        }
        let host = base_url
            .host_str()
            .ok_or_else(|| Error::Configuration(format!("missing host in '{base}'")))?
            .to_string();
        let port = base_url
            .port_or_known_default()
            .ok_or_else(|| Error::Configuration(format!("missing port in '{base}'")))?;

        Ok(Self {
            host,
            port,
            base_url,
        })
    }

    /// Node described by `base_uri`, or by `host` and `port` when unset.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        if let Some(base) = config.get(Property::BaseUri.key()) {
            return Self::from_url(base);
        }

        let host = config.get_property(Property::Host).unwrap_or("localhost");
        let port = config.get_property(Property::Port).unwrap_or("8123");
        let port = port
            .parse()
            .map_err(|_| Error::Configuration(format!("invalid port '{port}'")))?;
        Self::new(host, port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let node = Node::new("127.0.0.1", 8123).unwrap();
        assert_eq!(node.host(), "127.0.0.1");
        assert_eq!(node.port(), 8123);
        assert_eq!(node.base_url().as_str(), "http://127.0.0.1:8123/");
        assert_eq!(node.to_string(), "127.0.0.1:8123");
    }

    #[test]
    fn test_from_url_keeps_path() {
        let node = Node::from_url("https://ch.example.com/proxy/").unwrap();
        assert_eq!(node.port(), 443);
        assert_eq!(node.base_url().path(), "/proxy/");
    }

    #[test]
    fn test_invalid_urls() {
        assert!(matches!(Node::from_url("not a url"), Err(Error::Configuration(_))));
        assert!(matches!(Node::from_url("ftp://host/"), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_from_config() {
        let node = Node::from_config(&ClientConfig::new()).unwrap();
        assert_eq!(node.to_string(), "localhost:8123");

        let config = ClientConfig::new().with("host", "ch-2").with("port", "9000");
        assert_eq!(Node::from_config(&config).unwrap().to_string(), "ch-2:9000");

        let config = ClientConfig::new()
            .with("host", "ignored")
            .with("base_uri", "http://ch-3:8124/");
        assert_eq!(Node::from_config(&config).unwrap().to_string(), "ch-3:8124");

        let config = ClientConfig::new().with("port", "eighty");
        assert!(Node::from_config(&config).is_err());
    }
}
