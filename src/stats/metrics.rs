//! Counters for the broadcast hub and the TCP server
//!
//! Counters are updated with relaxed atomics from the hub task and the
//! connection tasks; snapshots are plain copies for reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live hub counters
#[derive(Debug)]
pub struct HubStats {
    started_at: Instant,
    frames_published: AtomicU64,
    frames_delivered: AtomicU64,
    frames_dropped: AtomicU64,
    subscribers: AtomicU64,
    total_subscriptions: AtomicU64,
}

/// Point-in-time copy of [`HubStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStatsSnapshot {
    /// Frames handed to the broadcast loop
    pub frames_published: u64,
    /// Frames placed into a mailbox
    pub frames_delivered: u64,
    /// Frames skipped because a mailbox was full or closed
    pub frames_dropped: u64,
    /// Currently registered subscribers
    pub subscribers: u64,
    /// Registrations since the hub started
    pub total_subscriptions: u64,
    /// Time since the hub started
    pub uptime: Duration,
}

impl HubStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_published: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            subscribers: AtomicU64::new(0),
            total_subscriptions: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_publish(&self) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivery(&self) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_drop(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_subscribers(&self, count: usize) {
        self.subscribers.store(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_subscription(&self) {
        self.total_subscriptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames dropped so far under the drop policy
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> HubStatsSnapshot {
        HubStatsSnapshot {
            frames_published: self.frames_published.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            subscribers: self.subscribers.load(Ordering::Relaxed),
            total_subscriptions: self.total_subscriptions.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for HubStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Live server counters
#[derive(Debug, Default)]
pub struct ServerStats {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    rejected_connections: AtomicU64,
    bytes_sent: AtomicU64,
}

/// Point-in-time copy of [`ServerStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStatsSnapshot {
    /// Connections accepted
    pub total_connections: u64,
    /// Connections currently streaming or being set up
    pub active_connections: u64,
    /// Connections refused (limit, bad request, missing capability)
    pub rejected_connections: u64,
    /// Event bytes written to subscribers
    pub bytes_sent: u64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_rejected(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_stats_new() {
        let snapshot = HubStats::new().snapshot();
        assert_eq!(snapshot.frames_published, 0);
        assert_eq!(snapshot.frames_delivered, 0);
        assert_eq!(snapshot.frames_dropped, 0);
        assert_eq!(snapshot.subscribers, 0);
        assert_eq!(snapshot.total_subscriptions, 0);
    }

    #[test]
    fn test_hub_stats_counters() {
        let stats = HubStats::new();
        stats.record_publish();
        stats.record_delivery();
        stats.record_delivery();
        stats.record_drop();
        stats.record_subscription();
        stats.set_subscribers(3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_published, 1);
        assert_eq!(snapshot.frames_delivered, 2);
        assert_eq!(snapshot.frames_dropped, 1);
        assert_eq!(snapshot.subscribers, 3);
        assert_eq!(snapshot.total_subscriptions, 1);
        assert_eq!(stats.frames_dropped(), 1);
    }

    #[test]
    fn test_server_stats_connections() {
        let stats = ServerStats::new();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();
        stats.connection_rejected();
        stats.add_bytes_sent(128);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_connections, 2);
        assert_eq!(snapshot.active_connections, 1);
        assert_eq!(snapshot.rejected_connections, 1);
        assert_eq!(snapshot.bytes_sent, 128);
    }
}
