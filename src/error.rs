//! Error types
//!
//! A single crate-level [`Error`] wraps the per-concern error kinds so callers
//! can use `?` across encoding, hub and transport operations.

use std::fmt;
use std::io;

pub use crate::hub::HubError;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug)]
pub enum Error {
    /// Socket or sink I/O failure
    Io(io::Error),
    /// HTTP connection failed (bad request head, timeout, reset)
    Http(hyper::Error),
    /// Payload could not be turned into a frame
    Encoding(EncodingError),
    /// Transport cannot carry an event stream
    Transport(TransportError),
    /// Hub is no longer accepting work
    Hub(HubError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Encoding(e) => write!(f, "Encoding error: {}", e),
            Error::Transport(e) => write!(f, "Transport error: {}", e),
            Error::Hub(e) => write!(f, "Hub error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            Error::Encoding(e) => Some(e),
            Error::Transport(e) => Some(e),
            Error::Hub(e) => Some(e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<hyper::Error> for Error {
    fn from(e: hyper::Error) -> Self {
        Error::Http(e)
    }
}

impl From<EncodingError> for Error {
    fn from(e: EncodingError) -> Self {
        Error::Encoding(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<HubError> for Error {
    fn from(e: HubError) -> Self {
        Error::Hub(e)
    }
}

/// Structured payload is not representable as JSON text
#[derive(Debug)]
pub enum EncodingError {
    /// Serializer rejected the value
    Json(serde_json::Error),
    /// Value contains NaN or an infinity
    NonFiniteNumber(f64),
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::Json(e) => write!(f, "{}", e),
            EncodingError::NonFiniteNumber(v) => {
                write!(f, "{} cannot be represented in JSON", v)
            }
        }
    }
}

impl std::error::Error for EncodingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodingError::Json(e) => Some(e),
            EncodingError::NonFiniteNumber(_) => None,
        }
    }
}

impl From<serde_json::Error> for EncodingError {
    fn from(e: serde_json::Error) -> Self {
        EncodingError::Json(e)
    }
}

/// Subscription request cannot be served as an event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Response sink cannot force partial output onto the wire
    FlushUnsupported,
    /// No way to observe the peer going away
    DisconnectUnsupported,
}

impl TransportError {
    /// HTTP status code used when rejecting the request
    pub fn status(&self) -> u16 {
        match self {
            TransportError::FlushUnsupported | TransportError::DisconnectUnsupported => 501,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::FlushUnsupported => write!(f, "Flushing not supported"),
            TransportError::DisconnectUnsupported => {
                write!(f, "Disconnect detection not supported")
            }
        }
    }
}

impl std::error::Error for TransportError {}
