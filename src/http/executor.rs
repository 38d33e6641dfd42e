//! Request execution.
//!
//! # Status handling
//! ```text
//! transport.send()
//!     → Ok(status < 400)          → Outcome::Success (body unread)
//!     → Ok(400 <= status < 500)   → drain body → Err(Error::Server)
//!     → Ok(status >= 500)         → close → Outcome::ServerUnavailable
//!     → Err(Unreachable)          → log → Outcome::Unreachable
//!     → Err(other)                → Err(Error::Transport)
//! ```
//!
//! # Design Decisions
//! - One round-trip per call; no retries here
//! - Every non-success branch closes the response before returning
//! - The executor holds only immutable configuration and the transport

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::Response;
use tracing::Instrument;

use crate::config::{ClientConfig, Property, RequestSettings};
use crate::error::{Error, Result};
use crate::http::body::{streaming_body, BodyWriter};
use crate::http::options::RequestOptions;
use crate::http::request::build_request;
use crate::http::response::{read_server_error, ClosedResponse, Outcome, ServerResponse};
use crate::net::{HyperTransport, Node, Transport, TransportError};
use crate::observability::metrics;

/// Builds, sends and classifies requests against a server node.
#[derive(Debug, Clone)]
pub struct RequestExecutor<T = HyperTransport> {
    transport: T,
    config: Arc<ClientConfig>,
    options: RequestOptions,
    metrics_group: String,
    span: tracing::Span,
}

impl RequestExecutor<HyperTransport> {
    /// Executor with a pooled hyper transport configured from `config`.
    pub fn from_config(config: ClientConfig) -> Self {
        let transport = HyperTransport::from_config(&config);
        Self::new(transport, config)
    }
}

impl<T: Transport> RequestExecutor<T> {
    /// Create an executor that sends through `transport`.
    pub fn new(transport: T, config: ClientConfig) -> Self {
        let options = RequestOptions::from_config(&config);
        let metrics_group = config
            .get_property(Property::MetricsGroupName)
            .unwrap_or_default()
            .to_string();
        let span = tracing::info_span!("clickhouse_client", group = %metrics_group);

        Self {
            transport,
            config: Arc::new(config),
            options,
            metrics_group,
            span,
        }
    }

    /// Record this executor's events under `span` instead of the default one.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send one request to `node`.
    ///
    /// `writer` produces the body and runs only while the transport sends it.
    /// On [`Outcome::Success`] the caller owns the open response.
    pub async fn execute<W: BodyWriter>(
        &self,
        node: &Node,
        settings: &RequestSettings,
        writer: W,
    ) -> Result<Outcome> {
        let start = Instant::now();
        let result = self
            .dispatch(node, settings, writer)
            .instrument(self.span.clone())
            .await;
        metrics::record_request(&self.metrics_group, &result, start);
        result
    }

    async fn dispatch<W: BodyWriter>(
        &self,
        node: &Node,
        settings: &RequestSettings,
        writer: W,
    ) -> Result<Outcome> {
        let view = self.config.view(settings);
        let request = build_request(node, &view, streaming_body(writer))?;
        let options = self.options.overlay(settings);

        tracing::debug!(
            node = %node,
            uri = %request.uri(),
            query_id = settings.query_id().unwrap_or_default(),
            "Sending request"
        );

        match self.transport.send(request, options).await {
            Ok(response) => classify(node, response).await,
            Err(TransportError::Unreachable(failure)) => {
                tracing::warn!(
                    node = %node,
                    kind = %failure.kind,
                    error = %failure.source,
                    "Server unreachable"
                );
                Ok(Outcome::Unreachable(failure))
            }
            Err(e) => {
                tracing::error!(node = %node, error = %e, "Request failed");
                Err(Error::Transport(e))
            }
        }
    }
}

async fn classify(node: &Node, response: Response<Body>) -> Result<Outcome> {
    let status = response.status();

    if status.as_u16() < 400 {
        return Ok(Outcome::Success(ServerResponse::new(response)));
    }

    if status.as_u16() < 500 {
        let error = read_server_error(response).await?;
        tracing::debug!(node = %node, status = %status, code = error.code, "Server rejected request");
        return Err(Error::Server(error));
    }

    let closed = ClosedResponse::close(response);
    tracing::warn!(
        node = %node,
        status = %status,
        code = closed.exception_code(),
        "Server error; response closed"
    );
    Ok(Outcome::ServerUnavailable(closed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::body::BodySink;
    use crate::net::{ConnectivityFailure, ConnectivityKind};
    use axum::http::{Request, StatusCode};
    use bytes::Bytes;
    use futures_util::stream;
    use std::future::Future;
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Sets the flag when dropped.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct BodyTracker {
        body_read: Arc<AtomicBool>,
        body_dropped: Arc<AtomicBool>,
    }

    impl BodyTracker {
        /// Body that records being polled and being dropped.
        fn body(&self, text: &'static str) -> Body {
            let read = self.body_read.clone();
            let guard = DropFlag(self.body_dropped.clone());
            Body::from_stream(stream::once(async move {
                let _guard = guard;
                read.store(true, Ordering::SeqCst);
                Ok::<_, io::Error>(Bytes::from_static(text.as_bytes()))
            }))
        }
    }

    enum Reply {
        Status {
            status: u16,
            headers: Vec<(&'static str, &'static str)>,
            body: Body,
        },
        Fail(Box<dyn Fn() -> TransportError + Send + Sync>),
    }

    #[derive(Default)]
    struct Seen {
        uri: Option<String>,
        headers: Option<axum::http::HeaderMap>,
        body: Option<Bytes>,
        options: Option<RequestOptions>,
        writer_calls_before_send: Option<usize>,
    }

    struct StubTransport {
        reply: Mutex<Option<Reply>>,
        seen: Mutex<Seen>,
        writer_calls: Arc<AtomicUsize>,
    }

    impl StubTransport {
        fn new(reply: Reply) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                seen: Mutex::new(Seen::default()),
                writer_calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn status(status: u16, headers: Vec<(&'static str, &'static str)>, body: Body) -> Self {
            Self::new(Reply::Status {
                status,
                headers,
                body,
            })
        }
    }

    impl Transport for StubTransport {
        fn send(
            &self,
            request: Request<Body>,
            options: RequestOptions,
        ) -> impl Future<Output = std::result::Result<Response<Body>, TransportError>> + Send {
            async move {
                {
                    let mut seen = self.seen.lock().unwrap();
                    seen.uri = Some(request.uri().to_string());
                    seen.headers = Some(request.headers().clone());
                    seen.options = Some(options);
                    seen.writer_calls_before_send = Some(self.writer_calls.load(Ordering::SeqCst));
                }

                // Sending drives the body writer.
                let body = axum::body::to_bytes(request.into_body(), usize::MAX)
                    .await
                    .map_err(|e| TransportError::Request(Box::new(e)))?;
                self.seen.lock().unwrap().body = Some(body);

                match self.reply.lock().unwrap().take().expect("one request per stub") {
                    Reply::Status {
                        status,
                        headers,
                        body,
                    } => {
                        let mut builder = Response::builder().status(status);
                        for (name, value) in headers {
                            builder = builder.header(name, value);
                        }
                        Ok(builder.body(body).unwrap())
                    }
                    Reply::Fail(make) => Err(make()),
                }
            }
        }
    }

    fn node() -> Node {
        Node::new("ch-1", 8123).unwrap()
    }

    fn counting_writer(calls: Arc<AtomicUsize>, text: &'static str) -> impl BodyWriter {
        move |mut sink: BodySink| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            sink.write(text).await
        }
    }

    fn unreachable(kind: ConnectivityKind) -> Reply {
        Reply::Fail(Box::new(move || {
            TransportError::Unreachable(ConnectivityFailure {
                kind,
                host: "ch-1".to_string(),
                source: "stub".into(),
            })
        }))
    }

    #[tokio::test]
    async fn test_success_returns_open_response() {
        let tracker = BodyTracker::default();
        let transport = StubTransport::status(200, vec![], tracker.body("1\n"));
        let calls = transport.writer_calls.clone();
        let executor = RequestExecutor::new(transport, ClientConfig::new());

        let outcome = executor
            .execute(&node(), &RequestSettings::new(), counting_writer(calls.clone(), "SELECT 1"))
            .await
            .unwrap();

        let seen = executor.transport().seen.lock().unwrap();
        assert_eq!(seen.writer_calls_before_send, Some(0));
        assert_eq!(seen.body.as_deref(), Some(&b"SELECT 1"[..]));
        drop(seen);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let response = outcome.into_response().expect("success");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!tracker.body_read.load(Ordering::SeqCst), "body must not be read");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"1\n");
    }

    #[tokio::test]
    async fn test_redirect_status_is_success() {
        let transport = StubTransport::status(304, vec![], Body::empty());
        let executor = RequestExecutor::new(transport, ClientConfig::new());
        let outcome = executor
            .execute(&node(), &RequestSettings::new(), crate::http::body::payload("SELECT 1"))
            .await
            .unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_client_error_is_classified() {
        let tracker = BodyTracker::default();
        let transport = StubTransport::status(
            404,
            vec![("X-ClickHouse-Exception-Code", "42")],
            tracker.body("boom"),
        );
        let executor = RequestExecutor::new(transport, ClientConfig::new());

        let err = executor
            .execute(&node(), &RequestSettings::new(), crate::http::body::payload("SELECT 1"))
            .await
            .unwrap_err();

        match err {
            Error::Server(e) => {
                assert_eq!(e.code, 42);
                assert_eq!(e.message, "boom");
                assert_eq!(e.status, StatusCode::NOT_FOUND);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(tracker.body_dropped.load(Ordering::SeqCst), "response must be closed");
    }

    #[tokio::test]
    async fn test_client_error_without_code() {
        let transport = StubTransport::status(400, vec![], Body::from("bad"));
        let executor = RequestExecutor::new(transport, ClientConfig::new());
        let err = executor
            .execute(&node(), &RequestSettings::new(), crate::http::body::payload(""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Server(e) if e.code == 0 && e.message == "bad"));
    }

    #[tokio::test]
    async fn test_error_body_failure_is_reported() {
        let body = Body::from_stream(stream::once(async {
            Err::<Bytes, _>(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }));
        let transport = StubTransport::status(400, vec![], body);
        let executor = RequestExecutor::new(transport, ClientConfig::new());
        let err = executor
            .execute(&node(), &RequestSettings::new(), crate::http::body::payload(""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ErrorBody(_)));
    }

    #[tokio::test]
    async fn test_server_error_returns_closed_response() {
        let tracker = BodyTracker::default();
        let transport = StubTransport::status(503, vec![], tracker.body("overloaded"));
        let executor = RequestExecutor::new(transport, ClientConfig::new());

        let outcome = executor
            .execute(&node(), &RequestSettings::new(), crate::http::body::payload("SELECT 1"))
            .await
            .unwrap();

        match outcome {
            Outcome::ServerUnavailable(closed) => {
                assert_eq!(closed.status(), StatusCode::SERVICE_UNAVAILABLE)
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!tracker.body_read.load(Ordering::SeqCst));
        assert!(tracker.body_dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_unknown_host_is_unreachable() {
        let transport = StubTransport::new(unreachable(ConnectivityKind::UnknownHost));
        let executor = RequestExecutor::new(transport, ClientConfig::new());

        let outcome = executor
            .execute(&node(), &RequestSettings::new(), crate::http::body::payload("SELECT 1"))
            .await
            .unwrap();

        match outcome {
            Outcome::Unreachable(failure) => {
                assert_eq!(failure.kind, ConnectivityKind::UnknownHost)
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refused_and_no_route_are_unreachable() {
        for kind in [ConnectivityKind::ConnectionRefused, ConnectivityKind::NoRouteToHost] {
            let executor = RequestExecutor::new(StubTransport::new(unreachable(kind)), ClientConfig::new());
            let outcome = executor
                .execute(&node(), &RequestSettings::new(), crate::http::body::payload(""))
                .await
                .unwrap();
            assert!(matches!(outcome, Outcome::Unreachable(f) if f.kind == kind));
        }
    }

    #[tokio::test]
    async fn test_other_transport_failures_propagate() {
        let reply = Reply::Fail(Box::new(|| TransportError::Timeout(Duration::from_secs(1))));
        let executor = RequestExecutor::new(StubTransport::new(reply), ClientConfig::new());
        let err = executor
            .execute(&node(), &RequestSettings::new(), crate::http::body::payload(""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_writer_failure_is_transport_error() {
        let transport = StubTransport::status(200, vec![], Body::empty());
        let executor = RequestExecutor::new(transport, ClientConfig::new());
        let writer = |mut sink: BodySink| async move {
            sink.write("INSERT INTO t FORMAT CSV\n").await?;
            Err::<(), _>(io::Error::new(io::ErrorKind::UnexpectedEof, "source closed"))
        };

        let err = executor
            .execute(&node(), &RequestSettings::new(), writer)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Request(_))));
    }

    #[tokio::test]
    async fn test_overrides_win_and_do_not_leak() {
        let config = ClientConfig::new()
            .with("format", "JSON")
            .with("clickhouse_setting_max_threads", "4");
        let transport = Arc::new(StubTransport::status(200, vec![], Body::empty()));
        let executor = RequestExecutor::new(transport.clone(), config);

        let settings = RequestSettings::new()
            .with_format("CSV")
            .with_server_setting("max_threads", "8")
            .with("connection_request_timeout", "100");
        executor
            .execute(&node(), &settings, crate::http::body::payload(""))
            .await
            .unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.headers.as_ref().unwrap()["x-clickhouse-format"], "CSV");
        assert!(seen.uri.as_ref().unwrap().contains("max_threads=8"));
        assert_eq!(
            seen.options.unwrap().connection_request_timeout,
            Some(Duration::from_millis(100))
        );
        drop(seen);

        assert_eq!(executor.options.connection_request_timeout, Some(Duration::from_secs(10)));
        assert_eq!(executor.config().get("format"), Some("JSON"));
    }

    #[tokio::test]
    async fn test_invalid_configuration_is_not_sent() {
        let config = ClientConfig::new().with("format", "bad\nvalue");
        let transport = StubTransport::status(200, vec![], Body::empty());
        let executor = RequestExecutor::new(transport, config);
        let err = executor
            .execute(&node(), &RequestSettings::new(), crate::http::body::payload(""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(executor.transport().seen.lock().unwrap().uri.is_none());
    }
}
