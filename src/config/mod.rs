//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or builder calls
//!     → loader.rs (parse & stringify values)
//!     → properties.rs (registry lookup, choice validation)
//!     → ClientConfig (validated, immutable, owned by the executor)
//!
//! Per call:
//!     RequestSettings (overrides)
//!     → ClientConfig::view() merges overrides over base values
//!     → keys.rs decodes namespaced keys and list values at the point of use
//! ```
//!
//! # Design Decisions
//! - The registry is a closed table; it never gains entries at runtime
//! - Every value is a string; coercion happens where the value is consumed
//! - Dynamic `http_header_*` and `clickhouse_setting_*` keys are parsed at the
//!   boundary instead of being registered

pub mod keys;
pub mod loader;
pub mod properties;
pub mod schema;

pub use loader::{load_config, load_config_str, ConfigError};
pub use properties::Property;
pub use schema::{ClientConfig, ConfigView, RequestSettings};
