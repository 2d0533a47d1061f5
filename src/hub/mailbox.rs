//! Per-subscriber mailbox
//!
//! A mailbox is a bounded FIFO of frames. The hub holds the sending half
//! ([`MailboxHandle`]) while the subscriber is registered; the transport
//! adapter drains the receiving half ([`Mailbox`]).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::protocol::Frame;

static NEXT_MAILBOX_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one mailbox
///
/// Ids are unique across every hub in the process, so a handle created by
/// one hub can be registered with another without colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MailboxId(pub(crate) u64);

impl MailboxId {
    pub(crate) fn next() -> Self {
        MailboxId(NEXT_MAILBOX_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MailboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sending half of a mailbox, owned by the hub once registered
///
/// Not `Clone`: a handle can only be registered once.
#[derive(Debug)]
pub struct MailboxHandle {
    id: MailboxId,
    tx: mpsc::Sender<Frame>,
}

impl MailboxHandle {
    pub fn id(&self) -> MailboxId {
        self.id
    }

    /// Wait for room, then enqueue
    pub(crate) async fn deliver(&self, frame: Frame) -> Result<(), mpsc::error::SendError<Frame>> {
        self.tx.send(frame).await
    }

    /// Enqueue only if there is room
    pub(crate) fn try_deliver(&self, frame: Frame) -> Result<(), mpsc::error::TrySendError<Frame>> {
        self.tx.try_send(frame)
    }
}

/// Receiving half of a mailbox
#[derive(Debug)]
pub struct Mailbox {
    id: MailboxId,
    capacity: usize,
    rx: mpsc::Receiver<Frame>,
}

impl Mailbox {
    /// Create a connected handle/mailbox pair with a fixed capacity
    pub(crate) fn channel(id: MailboxId, capacity: usize) -> (MailboxHandle, Mailbox) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        (
            MailboxHandle { id, tx },
            Mailbox { id, capacity, rx },
        )
    }

    pub fn id(&self) -> MailboxId {
        self.id
    }

    /// Capacity chosen at creation
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Next frame in publish order
    ///
    /// Returns `None` once the hub has released the mailbox (unregister or
    /// shutdown) and every queued frame was taken.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Take a queued frame without waiting
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    /// Number of frames waiting
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
