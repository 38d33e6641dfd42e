//! Streamed request bodies.
//!
//! # Responsibilities
//! - Wrap a caller-supplied [`BodyWriter`] as a chunked request body
//! - Start the writer only when the transport first polls the body
//! - Surface writer failures as body errors so the send fails
//!
//! # Design Decisions
//! - Payloads are never buffered whole; chunks flow through a bounded channel
//! - The writer runs inside the body stream's poll, no task is spawned
//! - A writer that drops its sink early still completes the body normally

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::mpsc;

/// Chunks buffered between the writer and the transport.
const CHANNEL_DEPTH: usize = 8;

type WriteFuture = Pin<Box<dyn Future<Output = io::Result<()>> + Send>>;
type Launch = Box<dyn FnOnce(BodySink) -> WriteFuture + Send>;

/// Writes the request payload into a [`BodySink`].
///
/// Implemented for any `FnOnce(BodySink) -> impl Future<Output = io::Result<()>>`.
pub trait BodyWriter: Send + 'static {
    fn write_body(self, sink: BodySink) -> impl Future<Output = io::Result<()>> + Send + 'static;
}

impl<F, Fut> BodyWriter for F
where
    F: FnOnce(BodySink) -> Fut + Send + 'static,
    Fut: Future<Output = io::Result<()>> + Send + 'static,
{
    fn write_body(self, sink: BodySink) -> impl Future<Output = io::Result<()>> + Send + 'static {
        self(sink)
    }
}

/// Writer that sends a fixed payload, e.g. a query text.
pub fn payload(data: impl Into<Bytes>) -> impl BodyWriter {
    let data = data.into();
    move |mut sink: BodySink| async move { sink.write(data).await }
}

/// Output side handed to a [`BodyWriter`].
#[derive(Debug)]
pub struct BodySink {
    tx: mpsc::Sender<Bytes>,
    written: u64,
}

impl BodySink {
    fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx, written: 0 }
    }

    /// Queue a chunk for sending. Waits while the transport is behind.
    pub async fn write(&mut self, chunk: impl Into<Bytes>) -> io::Result<()> {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return Ok(());
        }
        let len = chunk.len() as u64;
        self.tx
            .send(chunk)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "request body was dropped"))?;
        self.written += len;
        Ok(())
    }

    /// Bytes accepted so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}

enum State {
    Idle(Option<Launch>),
    Writing {
        task: WriteFuture,
        chunks: mpsc::Receiver<Bytes>,
        finished: bool,
    },
    Done,
}

/// Stream that launches the writer on first poll and yields its chunks.
struct WriterStream {
    state: State,
}

impl Stream for WriterStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                State::Idle(launch) => {
                    let Some(launch) = launch.take() else {
                        this.state = State::Done;
                        continue;
                    };
                    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
                    tracing::trace!("Request body writer started");
                    this.state = State::Writing {
                        task: launch(BodySink::new(tx)),
                        chunks: rx,
                        finished: false,
                    };
                }
                State::Writing {
                    task,
                    chunks,
                    finished,
                } => {
                    if !*finished {
                        if let Poll::Ready(result) = task.as_mut().poll(cx) {
                            *finished = true;
                            if let Err(e) = result {
                                tracing::debug!(error = %e, "Request body writer failed");
                                this.state = State::Done;
                                return Poll::Ready(Some(Err(e)));
                            }
                        }
                    }

                    return match chunks.poll_recv(cx) {
                        Poll::Ready(Some(chunk)) => Poll::Ready(Some(Ok(chunk))),
                        Poll::Ready(None) if *finished => {
                            this.state = State::Done;
                            Poll::Ready(None)
                        }
                        // Sink dropped while the writer is still running.
                        Poll::Ready(None) | Poll::Pending => Poll::Pending,
                    };
                }
                State::Done => return Poll::Ready(None),
            }
        }
    }
}

/// Chunked body driven by `writer`. Nothing runs until the body is polled.
pub fn streaming_body<W: BodyWriter>(writer: W) -> Body {
    let launch: Launch = Box::new(move |sink| -> WriteFuture { Box::pin(writer.write_body(sink)) });
    Body::from_stream(WriterStream {
        state: State::Idle(Some(launch)),
    })
}
