//! Encoded event frame
//!
//! A [`Frame`] is the exact byte sequence written to every subscriber for one
//! event. It wraps `bytes::Bytes`, so handing the same frame to many
//! mailboxes only bumps a reference count.

use bytes::Bytes;

/// One fully encoded, ready-to-transmit event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Bytes,
}

impl Frame {
    pub(crate) fn from_bytes(data: Bytes) -> Self {
        Self { data }
    }

    /// Raw wire bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the wire bytes
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Encoded length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
