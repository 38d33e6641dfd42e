//! Network subsystem.
//!
//! # Data Flow
//! ```text
//! ClientConfig
//!     → pool.rs (connector + pool settings)
//!     → transport.rs (pooled hyper client behind the Transport trait)
//!
//! Per request:
//!     node.rs (target base URL)
//!     → Transport::send (lease connection, write body, await head)
//!     → Response with unread body, or a classified TransportError
//! ```
//!
//! # Design Decisions
//! - The transport is injected; tests substitute their own implementation
//! - Connect failures are classified here so the executor only matches
//!   on error variants

pub mod node;
pub mod pool;
pub mod transport;

pub use node::Node;
pub use pool::PoolOptions;
pub use transport::{
    ConnectivityFailure, ConnectivityKind, HyperTransport, Transport, TransportError,
};
