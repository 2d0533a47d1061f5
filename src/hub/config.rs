//! Hub configuration

/// What the broadcast loop does when a subscriber's mailbox is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryPolicy {
    /// Wait for room. A stalled subscriber stalls every other subscriber
    /// and all pending register/unregister requests.
    #[default]
    Block,
    /// Skip the frame for that subscriber and count it as dropped
    DropNewest,
}

/// Configuration for a [`Hub`](super::Hub)
///
/// Fixed once the hub is created; mailboxes always get `mailbox_capacity`.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Frames a subscriber mailbox can hold before delivery must wait
    pub mailbox_capacity: usize,

    /// Pending register/unregister/publish requests before callers wait
    pub command_capacity: usize,

    /// Behaviour on a full mailbox
    pub delivery_policy: DeliveryPolicy,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 2,
            command_capacity: 1,
            delivery_policy: DeliveryPolicy::Block,
        }
    }
}

impl HubConfig {
    /// Set the mailbox capacity (at least 1)
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }

    /// Set the command queue capacity (at least 1)
    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity.max(1);
        self
    }

    /// Set the delivery policy
    pub fn delivery_policy(mut self, policy: DeliveryPolicy) -> Self {
        self.delivery_policy = policy;
        self
    }

    /// Drop frames for full mailboxes instead of waiting
    pub fn drop_on_full(self) -> Self {
        self.delivery_policy(DeliveryPolicy::DropNewest)
    }
}
