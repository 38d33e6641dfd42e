//! Client configuration property registry.
//!
//! # Responsibilities
//! - Name every client-tunable setting exactly once
//! - Carry the default value and the allowed choices for each setting
//! - Resolve raw configuration keys back to registered properties
//!
//! # Design Decisions
//! - One table drives the enum, the key strings, defaults and choices
//! - Lookups go through a map built once on first use
//! - Unknown keys are "not found", never an error

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::config::loader::ConfigError;

macro_rules! properties {
    (@default) => { None };
    (@default $default:literal) => { Some($default) };
    (
        $(
            $(#[$doc:meta])*
            $variant:ident => $key:literal
            $(, default = $default:literal)?
            $(, choices = [$($choice:literal),* $(,)?])?
            ;
        )*
    ) => {
        /// A registered client configuration property.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Property {
            $( $(#[$doc])* $variant, )*
        }

        impl Property {
            /// Every registered property, in declaration order.
            pub const ALL: &'static [Property] = &[$(Property::$variant),*];

            /// Canonical configuration key.
            pub const fn key(self) -> &'static str {
                match self {
                    $(Property::$variant => $key,)*
                }
            }

            /// Value used when the key is absent from the active configuration.
            pub const fn default_value(self) -> Option<&'static str> {
                match self {
                    $(Property::$variant => properties!(@default $($default)?),)*
                }
            }

            /// Allowed values. Empty means unconstrained.
            pub const fn choices(self) -> &'static [&'static str] {
                match self {
                    $(Property::$variant => &[$($($choice),*)?],)*
                }
            }
        }
    };
}

properties! {
    // Authentication
    /// User name sent with every request.
    User => "user", default = "default";
    Password => "password";
    /// Access token sent as a bearer credential. Takes precedence over user/password.
    AccessToken => "access_token";
    BearerToken => "bearer_token";
    /// Send credentials as `Authorization: Basic` instead of ClickHouse headers.
    HttpUseBasicAuth => "http_use_basic_auth", default = "true";
    /// Authenticate with the client certificate; only the user name is sent.
    SslAuthentication => "ssl_authentication", default = "false";

    // Network
    Host => "host", default = "localhost";
    Port => "port", default = "8123";
    /// Full base URI of the node; wins over host/port when set.
    BaseUri => "base_uri";
    /// TCP connect timeout in milliseconds.
    ConnectionTimeout => "connection_timeout";
    /// Milliseconds to wait for a connection lease. Zero or negative waits forever.
    ConnectionRequestTimeout => "connection_request_timeout", default = "10000";
    ConnectionTtl => "connection_ttl", default = "-1";
    ConnectionReuseStrategy => "connection_reuse_strategy", default = "FIFO", choices = ["LIFO", "FIFO"];
    /// Idle time in milliseconds before a pooled connection is closed.
    HttpKeepAliveTimeout => "http_keep_alive_timeout";
    /// Requests in flight per client, each holding its connection until the
    /// response body is dropped.
    HttpMaxOpenConnections => "max_open_connections", default = "10";
    /// With `false` connections are closed after each response instead of pooled.
    ConnectionPoolEnabled => "connection_pool_enabled", default = "true";
    SocketTimeout => "socket_timeout", default = "0";
    SocketRcvbuf => "socket_rcvbuf", default = "804800";
    SocketSndbuf => "socket_sndbuf", default = "804800";
    SocketReuseAddr => "socket_reuseaddr";
    SocketKeepAlive => "socket_keepalive";
    SocketTcpNoDelay => "socket_tcp_nodelay";
    SocketLinger => "socket_linger";
    ClientNetworkBufferSize => "client_network_buffer_size", default = "300000";

    // Compression
    /// Ask the server to compress responses.
    CompressServerResponse => "compress", default = "true";
    /// Tell the server that request bodies are compressed.
    CompressClientRequest => "decompress", default = "false";
    /// Use HTTP content encoding instead of ClickHouse native compression.
    UseHttpCompression => "client.use_http_compression", default = "false";
    Lz4UncompressedBufferSize => "compression.lz4.uncompressed_buffer_size", default = "65536";
    DisableNativeCompression => "disable_native_compression", default = "false";
    /// Request bodies written by the caller are already compressed.
    AppCompressedData => "app_compressed_data", default = "false";

    // Proxy
    ProxyType => "proxy_type", choices = ["DIRECT", "HTTP", "SOCKS"];
    ProxyHost => "proxy_host";
    ProxyPort => "proxy_port";
    ProxyUser => "proxy_user";
    ProxyPassword => "proxy_password";

    // TLS material
    SslMode => "ssl_mode", default = "strict", choices = ["strict", "none"];
    SslTrustStore => "trust_store";
    SslKeyStoreType => "key_store_type";
    SslKeyStore => "ssl_key_store";
    SslKeyStorePassword => "key_store_password";
    SslKey => "ssl_key";
    SslCertificate => "sslcert";
    CaCertificate => "sslrootcert";

    // Retry policy
    /// Maximum number of retries a caller-side retry loop may perform.
    MaxRetries => "retry", default = "3";
    /// Comma-separated fault causes eligible for retry.
    ClientRetryOnFailures => "client_retry_on_failures",
        default = "NoHttpResponse,ConnectTimeout,ConnectionRequestTimeout,ServerRetryable";

    // Session
    Database => "database", default = "default";
    /// Comma-separated list of roles activated for the session.
    SessionDbRoles => "session_db_roles";
    QueryId => "query_id";
    /// Registered as a server setting so it is forwarded with the others.
    LogComment => "clickhouse_setting_log_comment";
    MaxExecutionTime => "max_execution_time", default = "0";
    /// Server-side asynchronous insert.
    Async => "async", default = "false";
    WaitEndOfQuery => "wait_end_of_query";
    UseServerTimeZone => "use_server_time_zone", default = "true";
    UseTimeZone => "use_time_zone";
    ServerTimeZone => "server_time_zone", default = "UTC";

    // Format
    /// Input/output format name, sent as `X-ClickHouse-Format`.
    Format => "format";

    // Identification
    ClientName => "client_name", default = "";
    ProductName => "product_name";
    ServerVersion => "server_version";
    MaxThreadsPerClient => "max_threads_per_client", default = "0";
    MetricsGroupName => "metrics_name", default = "ch-http-pool";
}

static BY_KEY: LazyLock<HashMap<&'static str, Property>> =
    LazyLock::new(|| Property::ALL.iter().map(|p| (p.key(), *p)).collect());

impl Property {
    /// Look up a property by its canonical key.
    pub fn lookup(name: &str) -> Option<Property> {
        BY_KEY.get(name).copied()
    }

    /// Check `value` against the property's choice set.
    pub fn validate(self, value: &str) -> Result<(), ConfigError> {
        let choices = self.choices();
        if choices.is_empty() || choices.contains(&value) {
            return Ok(());
        }
        Err(ConfigError::InvalidChoice {
            key: self.key().to_string(),
            value: value.to_string(),
            choices: choices.join(", "),
        })
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
