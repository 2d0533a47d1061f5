//! Response sinks
//!
//! An [`EventSink`] is the write side of one subscriber connection: it
//! carries response headers, event bytes and flushes. [`BodySink`]
//! implements it as a streaming axum response body.

use std::convert::Infallible;
use std::future::Future;
use std::io;

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::protocol::Frame;

/// Chunks buffered between the sink and the HTTP connection
const BODY_CHANNEL_CAPACITY: usize = 1;

/// Write side of a subscriber connection
pub trait EventSink: Send {
    /// Whether `flush` forces partially written output onto the wire
    fn supports_flush(&self) -> bool;

    /// Set a response header; only honoured before the first write
    fn set_header(&mut self, name: &str, value: &str);

    /// Answer with an error status and a short plain-text message
    fn reject(&mut self, status: u16, message: &str) -> impl Future<Output = io::Result<()>> + Send;

    /// Write one frame's raw bytes
    fn write_frame(&mut self, frame: &Frame) -> impl Future<Output = io::Result<()>> + Send;

    /// Push everything written so far to the peer
    fn flush(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// Event-stream response delivered through a streaming HTTP body
///
/// The response (status and headers) is handed to the receiver returned by
/// [`BodySink::new`] on the first flush or rejection. Frames written after
/// that are buffered until the next flush and then passed to the body one
/// chunk per frame. The body ends when the sink is dropped.
pub struct BodySink {
    headers: HeaderMap,
    response: Option<oneshot::Sender<Response>>,
    body: mpsc::Sender<Bytes>,
    body_rx: Option<mpsc::Receiver<Bytes>>,
    pending: Vec<Bytes>,
    bytes_sent: u64,
}

impl BodySink {
    /// Create a sink and the receiver its response is delivered to
    pub fn new() -> (Self, oneshot::Receiver<Response>) {
        let (response_tx, response_rx) = oneshot::channel();
        let (body, body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);

        let sink = Self {
            headers: HeaderMap::new(),
            response: Some(response_tx),
            body,
            body_rx: Some(body_rx),
            pending: Vec::new(),
            bytes_sent: 0,
        };
        (sink, response_rx)
    }

    /// Resolves once the HTTP connection dropped the response body
    ///
    /// Never resolves before the response has been handed over.
    pub fn disconnected(&self) -> impl Future<Output = ()> + Send + 'static {
        let body = self.body.clone();
        async move { body.closed().await }
    }

    /// Event bytes flushed so far
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    fn respond(&mut self, response: Response) -> io::Result<()> {
        match self.response.take() {
            Some(tx) => tx.send(response).map_err(|_| gone()),
            None => Ok(()),
        }
    }

    fn start_stream(&mut self) -> io::Result<()> {
        let Some(mut body_rx) = self.body_rx.take() else {
            return Ok(());
        };

        let chunks = futures_util::stream::poll_fn(move |cx| {
            body_rx
                .poll_recv(cx)
                .map(|chunk| chunk.map(Ok::<_, Infallible>))
        });

        let mut response = Response::new(Body::from_stream(chunks));
        *response.headers_mut() = std::mem::take(&mut self.headers);
        self.respond(response)
    }
}

fn gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "response body dropped")
}

impl EventSink for BodySink {
    fn supports_flush(&self) -> bool {
        true
    }

    fn set_header(&mut self, name: &str, value: &str) {
        if self.response.is_none() {
            tracing::debug!(header = name, "Header set after response started, ignored");
            return;
        }

        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = name, "Invalid response header, ignored"),
        }
    }

    async fn reject(&mut self, status: u16, message: &str) -> io::Result<()> {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let response = (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", message),
        )
            .into_response();

        self.body_rx = None;
        self.respond(response)
    }

    async fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        self.pending.push(frame.bytes());
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.start_stream()?;

        for chunk in self.pending.drain(..) {
            let len = chunk.len() as u64;
            self.body.send(chunk).await.map_err(|_| gone())?;
            self.bytes_sent += len;
        }
        Ok(())
    }
}
