//! HTTP transport seam.
//!
//! # Responsibilities
//! - Define the [`Transport`] trait the executor dispatches through
//! - Provide the pooled hyper client implementation
//! - Classify connect failures (unknown host, refused, no route, timeout)
//!
//! # Design Decisions
//! - The pool is shared and thread-safe; the executor takes no locks
//! - `max_open_connections` leases gate sends; a lease lives as long as the
//!   response body, so an unread open response keeps its connection
//! - `connection_request_timeout` bounds only the wait for a lease; once a
//!   lease is held the request runs without a deadline
//! - Response bodies are never buffered here

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, BodyDataStream};
use axum::http::{Request, Response};
use futures_util::Stream;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ClientConfig;
use crate::error::BoxError;
use crate::http::RequestOptions;
use crate::net::pool::PoolOptions;

/// Sends one request and yields the response with an unread body.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: Request<Body>,
        options: RequestOptions,
    ) -> impl Future<Output = Result<Response<Body>, TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        request: Request<Body>,
        options: RequestOptions,
    ) -> impl Future<Output = Result<Response<Body>, TransportError>> + Send {
        self.as_ref().send(request, options)
    }
}

/// Why a server node could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityKind {
    UnknownHost,
    ConnectionRefused,
    NoRouteToHost,
}

impl fmt::Display for ConnectivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectivityKind::UnknownHost => "unknown host",
            ConnectivityKind::ConnectionRefused => "connection refused",
            ConnectivityKind::NoRouteToHost => "no route to host",
        })
    }
}

/// A node could not be reached; no request was delivered.
#[derive(Debug, Error)]
#[error("{kind}: {host}")]
pub struct ConnectivityFailure {
    pub kind: ConnectivityKind,
    pub host: String,
    #[source]
    pub source: BoxError,
}

/// Errors produced while sending a request.
#[derive(Debug, Error)]
pub enum TransportError {
    /// DNS, refused or unroutable connect.
    #[error(transparent)]
    Unreachable(ConnectivityFailure),

    /// TCP connect did not complete within `connection_timeout`.
    #[error("connect to {host} timed out")]
    ConnectTimeout {
        host: String,
        #[source]
        source: BoxError,
    },

    /// No connection lease within `connection_request_timeout`.
    #[error("no connection available within {0:?}")]
    Timeout(Duration),

    /// Any other send failure, including request body writer errors.
    #[error("request failed: {0}")]
    Request(#[source] BoxError),
}

/// Pooled hyper client.
#[derive(Clone, Debug)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
    leases: Arc<Semaphore>,
}

impl HyperTransport {
    /// Create a transport with the given pool settings.
    pub fn new(options: &PoolOptions) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(options.tcp_nodelay);
        connector.set_keepalive(options.tcp_keepalive);
        connector.set_connect_timeout(options.connect_timeout);
        connector.set_send_buffer_size(options.send_buffer_size);
        connector.set_recv_buffer_size(options.recv_buffer_size);
        connector.set_reuse_address(options.reuse_address);

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(options.max_idle_per_host)
            .pool_idle_timeout(options.idle_timeout)
            .build(connector);

        let permits = match options.max_open_connections {
            0 => Semaphore::MAX_PERMITS,
            n => n.min(Semaphore::MAX_PERMITS),
        };

        tracing::debug!(
            max_open_connections = options.max_open_connections,
            max_idle_per_host = options.max_idle_per_host,
            idle_timeout = ?options.idle_timeout,
            connect_timeout = ?options.connect_timeout,
            "HTTP transport initialized"
        );

        Self {
            client,
            leases: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Leases not currently held by a request or an open response.
    pub fn available_connections(&self) -> usize {
        self.leases.available_permits()
    }

    /// Create a transport from the client configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(&PoolOptions::from_config(config))
    }
}

impl Transport for HyperTransport {
    fn send(
        &self,
        request: Request<Body>,
        options: RequestOptions,
    ) -> impl Future<Output = Result<Response<Body>, TransportError>> + Send {
        let host = request.uri().host().unwrap_or_default().to_string();
        let client = self.client.clone();
        let leases = self.leases.clone();

        async move {
            let lease = lease(leases, options.connection_request_timeout).await?;
            let response = client
                .request(request)
                .await
                .map_err(|e| classify(&host, e))?;

            let (parts, body) = response.into_parts();
            let body = Body::from_stream(Leased {
                inner: Body::new(body).into_data_stream(),
                _lease: lease,
            });
            Ok(Response::from_parts(parts, body))
        }
    }
}

/// Wait for a connection lease, bounded by `limit` when set.
async fn lease(
    leases: Arc<Semaphore>,
    limit: Option<Duration>,
) -> Result<OwnedSemaphorePermit, TransportError> {
    let acquire = leases.acquire_owned();
    let permit = match limit {
        Some(limit) => tokio::time::timeout(limit, acquire)
            .await
            .map_err(|_| TransportError::Timeout(limit))?,
        None => acquire.await,
    };
    permit.map_err(|e| TransportError::Request(Box::new(e)))
}

/// Response body that returns its connection lease when dropped.
struct Leased {
    inner: BodyDataStream,
    _lease: OwnedSemaphorePermit,
}

impl Stream for Leased {
    type Item = Result<bytes::Bytes, axum::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

enum ConnectKind {
    Unreachable(ConnectivityKind),
    TimedOut,
}

fn classify(host: &str, err: hyper_util::client::legacy::Error) -> TransportError {
    let kind = if err.is_connect() {
        connect_kind(&err)
    } else {
        None
    };

    match kind {
        Some(ConnectKind::Unreachable(kind)) => TransportError::Unreachable(ConnectivityFailure {
            kind,
            host: host.to_string(),
            source: Box::new(err),
        }),
        Some(ConnectKind::TimedOut) => TransportError::ConnectTimeout {
            host: host.to_string(),
            source: Box::new(err),
        },
        None => TransportError::Request(Box::new(err)),
    }
}

/// Walk the source chain of a connect error looking for a known cause.
fn connect_kind(err: &(dyn StdError + 'static)) -> Option<ConnectKind> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<io::Error>() {
            match io.kind() {
                io::ErrorKind::ConnectionRefused => {
                    return Some(ConnectKind::Unreachable(ConnectivityKind::ConnectionRefused))
                }
                io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
                    return Some(ConnectKind::Unreachable(ConnectivityKind::NoRouteToHost))
                }
                io::ErrorKind::TimedOut => return Some(ConnectKind::TimedOut),
                _ => {}
            }
        }

        // hyper-util reports resolver failures as "dns error"
        let message = e.to_string();
        if message.starts_with("dns error") || message.contains("failed to lookup address") {
            return Some(ConnectKind::Unreachable(ConnectivityKind::UnknownHost));
        }
        current = e.source();
    }
    None
}
