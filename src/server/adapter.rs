//! Subscriber transport adapter
//!
//! Drives one subscriber connection: checks the sink can carry an event
//! stream, sets the stream headers, registers a mailbox and copies frames
//! to the sink until the peer goes away.

use std::future::Future;

use crate::error::{Result, TransportError};
use crate::hub::Hub;
use crate::protocol::constants::STREAM_HEADERS;
use crate::protocol::Frame;

use super::sink::EventSink;

/// Serve an event stream to one subscriber
///
/// `closed` resolves when the peer disconnects; `None` means the transport
/// cannot detect that. Sinks without flush support and transports without
/// disconnect detection are rejected with `501` before anything is
/// registered. A hub that has shut down is answered with `503`.
///
/// Returns once the peer disconnected (`Ok`), the hub shut down (`Ok`), or
/// a write failed (`Err`). The mailbox is unregistered in every case.
pub async fn stream_events<S, C>(hub: &Hub, sink: &mut S, closed: Option<C>) -> Result<()>
where
    S: EventSink,
    C: Future<Output = ()>,
{
    if !sink.supports_flush() {
        return reject(sink, TransportError::FlushUnsupported).await;
    }
    let closed = match closed {
        Some(closed) => closed,
        None => return reject(sink, TransportError::DisconnectUnsupported).await,
    };
    tokio::pin!(closed);

    for (name, value) in STREAM_HEADERS {
        sink.set_header(name, value);
    }

    let mut mailbox = match hub.subscribe().await {
        Ok(mailbox) => mailbox,
        Err(e) => {
            tracing::warn!(error = %e, "Event stream request rejected");
            sink.reject(503, &e.to_string()).await?;
            return Err(e.into());
        }
    };
    let id = mailbox.id();

    let result: Result<()> = match sink.flush().await {
        Ok(()) => loop {
            tokio::select! {
                _ = &mut closed => {
                    tracing::debug!(subscriber = %id, "Peer disconnected");
                    break Ok(());
                }
                frame = mailbox.recv() => match frame {
                    Some(frame) => {
                        if let Err(e) = send(sink, &frame).await {
                            tracing::debug!(subscriber = %id, error = %e, "Write failed");
                            break Err(e.into());
                        }
                    }
                    None => {
                        tracing::debug!(subscriber = %id, "Hub released mailbox");
                        break Ok(());
                    }
                },
            }
        },
        Err(e) => Err(e.into()),
    };

    // Closing the mailbox first lets a blocked broadcast loop move on
    drop(mailbox);
    hub.unregister(id).await;

    result
}

async fn send<S: EventSink>(sink: &mut S, frame: &Frame) -> std::io::Result<()> {
    sink.write_frame(frame).await?;
    sink.flush().await
}

async fn reject<S: EventSink>(sink: &mut S, error: TransportError) -> Result<()> {
    tracing::warn!(error = %error, "Event stream request rejected");
    sink.reject(error.status(), &error.to_string()).await?;
    Err(error.into())
}
