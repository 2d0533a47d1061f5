//! Broadcast hub
//!
//! The hub owns the set of subscriber mailboxes and fans every published
//! frame out to all of them.
//!
//! # Architecture
//!
//! ```text
//!   [Publisher]    [Publisher]     [Adapter]          [Adapter]
//!   send_string()  send_json()     register()         unregister()
//!        │              │              │                   │
//!        └──────────────┴──────┬───────┴───────────────────┘
//!                              ▼
//!                 mpsc<Command> (FIFO, bounded)
//!                              │
//!                              ▼
//!                ┌───────────────────────────┐
//!                │ BroadcastLoop (one task)  │
//!                │ registry: HashMap<Id,     │
//!                │   MailboxHandle>          │
//!                └─────────────┬─────────────┘
//!                              │ publish: deliver to each
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//!          [Mailbox]       [Mailbox]       [Mailbox]
//!         mpsc<Frame>     mpsc<Frame>     mpsc<Frame>
//!              │               │               │
//!              ▼               ▼               ▼
//!           adapter ──► sink.write_frame() + flush() ──► TCP
//! ```
//!
//! # Zero-Copy Design
//!
//! Frames hold `bytes::Bytes`, so every mailbox shares the allocation made
//! by the encoder.

pub mod config;
pub mod error;
pub mod mailbox;
pub mod store;

pub use config::{DeliveryPolicy, HubConfig};
pub use error::HubError;
pub use mailbox::{Mailbox, MailboxHandle, MailboxId};
pub use store::Hub;
