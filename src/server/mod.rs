//! Event-stream transport
//!
//! The generic adapter ([`stream_events`]) serves one subscriber over any
//! [`EventSink`]. [`router`] exposes it as an axum route, and [`SseServer`]
//! serves that route over HTTP/1.1 on TCP.

pub mod adapter;
pub mod config;
pub(crate) mod connection;
pub mod listener;
pub mod routes;
pub mod sink;

pub use adapter::stream_events;
pub use config::ServerConfig;
pub use listener::SseServer;
pub use routes::router;
pub use sink::{BodySink, EventSink};
