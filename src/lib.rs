//! Server-Sent Events broadcast engine
//!
//! A [`Hub`] keeps the set of connected subscribers and fans every published
//! event out to all of them. Events are encoded once into the
//! `text/event-stream` wire format and shared by every subscriber.
//!
//! # Example
//! ```no_run
//! use sse_rs::{Hub, ServerConfig, SseServer};
//!
//! # async fn example() -> sse_rs::Result<()> {
//! let hub = Hub::new();
//! let server = SseServer::new(ServerConfig::default(), hub.clone());
//!
//! tokio::spawn(async move {
//!     let _ = server.run().await;
//! });
//!
//! hub.send_string("", "greeting", "hello\nworld").await?;
//! hub.send_json("", "status", &serde_json::json!({"ok": true})).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod hub;
pub mod protocol;
pub mod server;
pub mod stats;

pub use error::{EncodingError, Error, Result, TransportError};
pub use hub::{DeliveryPolicy, Hub, HubConfig, HubError, Mailbox, MailboxHandle, MailboxId};
pub use protocol::{Data, Frame};
pub use server::{router, stream_events, BodySink, EventSink, ServerConfig, SseServer};
