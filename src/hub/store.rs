//! Broadcast hub implementation
//!
//! [`Hub`] is a cheap, cloneable handle. All state lives in a single task
//! (the broadcast loop) that owns the registry of mailboxes. Handles talk to
//! it over one bounded command queue, so register, unregister and publish
//! requests take effect strictly one at a time in arrival order and the
//! registry needs no lock.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use super::config::{DeliveryPolicy, HubConfig};
use super::error::HubError;
use super::mailbox::{Mailbox, MailboxHandle, MailboxId};
use crate::error::Result;
use crate::protocol::{self, Data, Frame};
use crate::stats::{HubStats, HubStatsSnapshot};

enum Command {
    Register(MailboxHandle),
    Unregister(MailboxId),
    Publish(Frame),
    Count(oneshot::Sender<usize>),
    Shutdown(oneshot::Sender<usize>),
}

/// Handle to a broadcast hub
///
/// Creating a hub spawns its broadcast loop on the current tokio runtime.
/// The loop runs until [`Hub::shutdown`] is called or every handle is dropped.
#[derive(Clone)]
pub struct Hub {
    commands: mpsc::Sender<Command>,
    config: Arc<HubConfig>,
    stats: Arc<HubStats>,
}

impl Hub {
    /// Create a hub with default configuration
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a hub with custom configuration
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_config(config: HubConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
        let stats = Arc::new(HubStats::new());

        let broadcast_loop = BroadcastLoop {
            commands: rx,
            registry: HashMap::new(),
            policy: config.delivery_policy,
            stats: Arc::clone(&stats),
        };
        tokio::spawn(broadcast_loop.run());

        Self {
            commands: tx,
            config: Arc::new(config),
            stats,
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Current counters
    pub fn stats(&self) -> HubStatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether the broadcast loop has stopped accepting commands
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Create an unregistered mailbox with the configured capacity
    pub fn mailbox(&self) -> (MailboxHandle, Mailbox) {
        Mailbox::channel(MailboxId::next(), self.config.mailbox_capacity)
    }

    /// Create a mailbox and register it
    ///
    /// The subscriber receives every frame published after this call.
    pub async fn subscribe(&self) -> std::result::Result<Mailbox, HubError> {
        let (handle, mailbox) = self.mailbox();
        self.register(handle).await?;
        Ok(mailbox)
    }

    /// Add a mailbox to the registry
    pub async fn register(&self, handle: MailboxHandle) -> std::result::Result<(), HubError> {
        self.command(Command::Register(handle)).await
    }

    /// Remove a mailbox from the registry
    ///
    /// Unknown ids and a closed hub are both no-ops.
    pub async fn unregister(&self, id: MailboxId) {
        let _ = self.command(Command::Unregister(id)).await;
    }

    /// Hand a frame to the broadcast loop for delivery to every subscriber
    pub async fn publish(&self, frame: Frame) -> std::result::Result<(), HubError> {
        self.command(Command::Publish(frame)).await
    }

    /// Number of registered mailboxes, as seen by the broadcast loop
    pub async fn subscriber_count(&self) -> std::result::Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Count(reply)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Stop the hub
    ///
    /// Every registered mailbox is released, so subscribers see end of
    /// stream once their queued frames are drained. Later register and
    /// publish calls fail with [`HubError::Closed`]. Returns the number of
    /// subscribers released.
    pub async fn shutdown(&self) -> std::result::Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Shutdown(reply)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Encode and publish an event
    pub async fn send(&self, id: &str, event: &str, data: Data<'_>) -> std::result::Result<(), HubError> {
        self.publish(protocol::encode(id, event, data)).await
    }

    /// Publish an event whose data is a string
    pub async fn send_string(&self, id: &str, event: &str, data: &str) -> std::result::Result<(), HubError> {
        self.publish(protocol::encode_str(id, event, data)).await
    }

    /// Publish an event whose data is a byte slice interpreted as text
    pub async fn send_bytes(&self, id: &str, event: &str, data: &[u8]) -> std::result::Result<(), HubError> {
        self.publish(protocol::encode_bytes(id, event, data)).await
    }

    /// Publish an event whose data is a signed integer
    pub async fn send_int(&self, id: &str, event: &str, data: i64) -> std::result::Result<(), HubError> {
        self.publish(protocol::encode_int(id, event, data)).await
    }

    /// Publish an event whose data is an unsigned integer
    pub async fn send_uint(&self, id: &str, event: &str, data: u64) -> std::result::Result<(), HubError> {
        self.publish(protocol::encode_uint(id, event, data)).await
    }

    /// Publish an event whose data is `value` encoded as JSON
    ///
    /// If the value cannot be encoded nothing is published and the error is
    /// returned.
    pub async fn send_json<T>(&self, id: &str, event: &str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let frame = protocol::encode_json(id, event, value)?;
        self.publish(frame).await?;
        Ok(())
    }

    async fn command(&self, command: Command) -> std::result::Result<(), HubError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HubError::Closed)
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The task that exclusively owns the registry
struct BroadcastLoop {
    commands: mpsc::Receiver<Command>,
    registry: HashMap<MailboxId, MailboxHandle>,
    policy: DeliveryPolicy,
    stats: Arc<HubStats>,
}

impl BroadcastLoop {
    async fn run(mut self) {
        tracing::debug!(policy = ?self.policy, "Hub started");

        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Register(handle) => {
                    let id = handle.id();
                    self.registry.insert(id, handle);
                    self.stats.record_subscription();
                    self.stats.set_subscribers(self.registry.len());

                    tracing::info!(
                        subscriber = %id,
                        subscribers = self.registry.len(),
                        "Subscriber registered"
                    );
                }
                Command::Unregister(id) => {
                    if self.registry.remove(&id).is_some() {
                        self.stats.set_subscribers(self.registry.len());

                        tracing::info!(
                            subscriber = %id,
                            subscribers = self.registry.len(),
                            "Subscriber unregistered"
                        );
                    }
                }
                Command::Publish(frame) => self.broadcast(frame).await,
                Command::Count(reply) => {
                    let _ = reply.send(self.registry.len());
                }
                Command::Shutdown(reply) => {
                    // Refuse new commands before acknowledging
                    self.commands.close();

                    let released = self.registry.len();
                    self.registry.clear();
                    self.stats.set_subscribers(0);
                    let _ = reply.send(released);

                    tracing::info!(released = released, "Hub shut down");
                    return;
                }
            }
        }

        tracing::debug!("Hub stopped, all handles dropped");
    }

    async fn broadcast(&self, frame: Frame) {
        self.stats.record_publish();

        for (id, handle) in &self.registry {
            match self.policy {
                DeliveryPolicy::Block => match handle.deliver(frame.clone()).await {
                    Ok(()) => self.stats.record_delivery(),
                    Err(_) => {
                        self.stats.record_drop();
                        tracing::debug!(subscriber = %id, "Mailbox closed, frame skipped");
                    }
                },
                DeliveryPolicy::DropNewest => match handle.try_deliver(frame.clone()) {
                    Ok(()) => self.stats.record_delivery(),
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        self.stats.record_drop();
                        tracing::warn!(
                            subscriber = %id,
                            dropped = self.stats.frames_dropped(),
                            "Mailbox full, frame dropped"
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        self.stats.record_drop();
                        tracing::debug!(subscriber = %id, "Mailbox closed, frame skipped");
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::error::{EncodingError, Error};
    use crate::protocol::encode_str;

    fn frame(data: &str) -> Frame {
        encode_str("", "", data)
    }

    #[tokio::test]
    async fn test_register_unregister() {
        let hub = Hub::new();
        assert_eq!(hub.subscriber_count().await.unwrap(), 0);

        let mut ids = Vec::new();
        for _ in 0..5 {
            let (handle, mailbox) = hub.mailbox();
            ids.push(mailbox.id());
            hub.register(handle).await.unwrap();
            hub.publish(frame("tick")).await.unwrap();
        }
        assert_eq!(hub.subscriber_count().await.unwrap(), 5);

        for id in ids {
            hub.publish(frame("tick")).await.unwrap();
            hub.unregister(id).await;
        }
        assert_eq!(hub.subscriber_count().await.unwrap(), 0);
        assert_eq!(hub.stats().total_subscriptions, 5);
    }

    #[tokio::test]
    async fn test_register_handle_from_other_hub() {
        let hub_a = Hub::new();
        let hub_b = Hub::new();

        let mut first = hub_b.subscribe().await.unwrap();
        let (foreign, mut second) = hub_a.mailbox();
        assert_ne!(first.id(), second.id());

        hub_b.register(foreign).await.unwrap();
        assert_eq!(hub_b.subscriber_count().await.unwrap(), 2);

        hub_b.publish(frame("x")).await.unwrap();
        assert_eq!(first.recv().await.unwrap(), frame("x"));
        assert_eq!(second.recv().await.unwrap(), frame("x"));
    }

    #[tokio::test]
    async fn test_unregister_unknown_is_noop() {
        let hub = Hub::new();
        let _mailbox = hub.subscribe().await.unwrap();

        let (handle, _) = hub.mailbox();
        hub.unregister(handle.id()).await;

        assert_eq!(hub.subscriber_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_publish_order_per_subscriber() {
        let hub = Hub::with_config(HubConfig::default().mailbox_capacity(64));
        let mut first = hub.subscribe().await.unwrap();
        let mut second = hub.subscribe().await.unwrap();

        for i in 0..20 {
            hub.send_int("", "seq", i).await.unwrap();
        }

        for i in 0..20 {
            let expected = protocol::encode_int("", "seq", i);
            assert_eq!(first.recv().await.unwrap(), expected);
            assert_eq!(second.recv().await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscriber() {
        let hub = Hub::new();
        let mut early = hub.subscribe().await.unwrap();

        hub.send_string("", "", "before").await.unwrap();
        let mut late = hub.subscribe().await.unwrap();
        hub.send_string("", "", "after").await.unwrap();

        assert_eq!(early.recv().await.unwrap(), frame("before"));
        assert_eq!(early.recv().await.unwrap(), frame("after"));
        assert_eq!(late.recv().await.unwrap(), frame("after"));

        hub.subscriber_count().await.unwrap();
        assert!(late.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_publishers() {
        let hub = Hub::with_config(HubConfig::default().mailbox_capacity(256));
        let mut mailbox = hub.subscribe().await.unwrap();

        let mut tasks = Vec::new();
        for publisher in 0..4u64 {
            let hub = hub.clone();
            tasks.push(tokio::spawn(async move {
                for n in 0..25u64 {
                    hub.send_uint("", "", publisher * 100 + n).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Each publisher's frames arrive in its own order
        let mut last: HashMap<u64, u64> = HashMap::new();
        for _ in 0..100 {
            let frame = mailbox.recv().await.unwrap();
            let text = std::str::from_utf8(frame.as_bytes()).unwrap();
            let value: u64 = text
                .trim_start_matches("data:")
                .trim_end()
                .parse()
                .unwrap();
            let (publisher, n) = (value / 100, value % 100);
            if let Some(prev) = last.insert(publisher, n) {
                assert!(n > prev);
            }
        }
        assert_eq!(last.len(), 4);
    }

    #[tokio::test]
    async fn test_json_error_publishes_nothing() {
        let hub = Hub::new();
        let mut mailbox = hub.subscribe().await.unwrap();

        let result = hub.send_json("", "json", &f64::INFINITY).await;
        assert!(matches!(
            result,
            Err(Error::Encoding(EncodingError::NonFiniteNumber(_)))
        ));

        hub.subscriber_count().await.unwrap();
        assert!(mailbox.try_recv().is_none());
        assert_eq!(hub.stats().frames_published, 0);
    }

    #[tokio::test]
    async fn test_blocking_policy_stalls_on_full_mailbox() {
        let hub = Hub::with_config(HubConfig::default().mailbox_capacity(1));
        let mut stalled = hub.subscribe().await.unwrap();

        hub.send_string("", "", "1").await.unwrap();
        hub.send_string("", "", "2").await.unwrap();

        // Loop is waiting for room in the stalled mailbox
        let count = tokio::time::timeout(Duration::from_millis(100), hub.subscriber_count()).await;
        assert!(count.is_err());

        assert_eq!(stalled.recv().await.unwrap(), frame("1"));
        assert_eq!(hub.subscriber_count().await.unwrap(), 1);
        assert_eq!(stalled.recv().await.unwrap(), frame("2"));
        assert_eq!(hub.stats().frames_dropped, 0);
    }

    #[tokio::test]
    async fn test_drop_policy_counts_drops() {
        let config = HubConfig::default().mailbox_capacity(1).drop_on_full();
        let hub = Hub::with_config(config);
        let mut slow = hub.subscribe().await.unwrap();

        for data in ["1", "2", "3"] {
            hub.send_string("", "", data).await.unwrap();
        }
        hub.subscriber_count().await.unwrap();

        assert_eq!(slow.recv().await.unwrap(), frame("1"));
        assert!(slow.try_recv().is_none());

        let stats = hub.stats();
        assert_eq!(stats.frames_published, 3);
        assert_eq!(stats.frames_delivered, 1);
        assert_eq!(stats.frames_dropped, 2);
    }

    #[tokio::test]
    async fn test_dropped_mailbox_does_not_stall() {
        let hub = Hub::with_config(HubConfig::default().mailbox_capacity(1));
        let gone = hub.subscribe().await.unwrap();
        let mut alive = hub.subscribe().await.unwrap();
        drop(gone);

        for data in ["1", "2", "3"] {
            hub.send_string("", "", data).await.unwrap();
            assert_eq!(alive.recv().await.unwrap(), frame(data));
        }

        // Still registered until the owner unregisters it
        assert_eq!(hub.subscriber_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_releases_subscribers() {
        let hub = Hub::new();
        let mut first = hub.subscribe().await.unwrap();
        let mut second = hub.subscribe().await.unwrap();

        hub.send_string("", "", "bye").await.unwrap();
        assert_eq!(hub.shutdown().await.unwrap(), 2);
        assert!(hub.is_closed());

        assert_eq!(first.recv().await.unwrap(), frame("bye"));
        assert!(first.recv().await.is_none());
        assert_eq!(second.recv().await.unwrap(), frame("bye"));
        assert!(second.recv().await.is_none());

        assert_eq!(hub.subscribe().await.unwrap_err(), HubError::Closed);
        assert_eq!(
            hub.send_string("", "", "late").await.unwrap_err(),
            HubError::Closed
        );
        assert!(hub.shutdown().await.is_err());
    }

    #[tokio::test]
    async fn test_mailbox_capacity_from_config() {
        let hub = Hub::with_config(HubConfig::default().mailbox_capacity(8));
        let mailbox = hub.subscribe().await.unwrap();
        assert_eq!(mailbox.capacity(), 8);

        let (first, _) = hub.mailbox();
        let (second, _) = hub.mailbox();
        assert_ne!(first.id(), second.id());
    }
}
