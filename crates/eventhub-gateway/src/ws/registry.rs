//! Recipient → live push channels.
//!
//! One `ChannelRegistry` is created at startup and shared (via `Arc`) by the
//! connection handler, which adds and removes channels, and the delivery
//! broker, which snapshots them. The map is a `DashMap`, so every operation
//! locks only the shard holding that recipient and never across an await.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use eventhub_core::types::UserId;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Identifies one live connection. Unique for the life of the process.
pub type ConnId = String;

#[derive(Debug, Error)]
pub enum PushError {
    /// The connection task has gone away and dropped its receiver.
    #[error("channel {0} is closed")]
    Closed(ConnId),
}

/// Sending half of one connection's outbound queue.
///
/// The queue is unbounded: pushing never waits, and a slow client only grows
/// its own backlog. The connection task drains it in FIFO order, which is
/// what keeps per-channel delivery in publish order.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    id: ConnId,
    tx: mpsc::UnboundedSender<Arc<str>>,
}

impl ChannelHandle {
    /// Create a handle plus the receiver its connection task will drain.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Arc<str>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: uuid::Uuid::new_v4().to_string(),
            tx,
        };
        (handle, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Hand a payload to the outbound queue. Fails only once the receiving
    /// connection has shut down.
    pub fn push(&self, payload: Arc<str>) -> Result<(), PushError> {
        self.tx
            .send(payload)
            .map_err(|_| PushError::Closed(self.id.clone()))
    }
}

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    groups: DashMap<String, HashMap<ConnId, ChannelHandle>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel under `recipient`, creating the group on first use.
    pub fn register(&self, recipient: &UserId, handle: ChannelHandle) {
        debug!(recipient = %recipient, conn_id = %handle.id, "channel registered");
        self.groups
            .entry(recipient.as_str().to_string())
            .or_default()
            .insert(handle.id.clone(), handle);
    }

    /// Remove a channel. Unknown recipients or already-removed channels are
    /// a no-op. Returns whether this call removed something.
    ///
    /// The group entry is dropped together with its last channel, inside the
    /// same shard lock, so a concurrent `register` can never land in an entry
    /// that is about to disappear.
    pub fn unregister(&self, recipient: &UserId, conn_id: &str) -> bool {
        let mut removed = false;
        self.groups.remove_if_mut(recipient.as_str(), |_, group| {
            removed = group.remove(conn_id).is_some();
            group.is_empty()
        });
        if removed {
            debug!(recipient = %recipient, conn_id, "channel unregistered");
        }
        removed
    }

    /// Snapshot of the channels registered for `recipient` right now.
    /// Empty when the recipient has no live connection.
    pub fn channels_for(&self, recipient: &UserId) -> Vec<ChannelHandle> {
        self.groups
            .get(recipient.as_str())
            .map(|group| group.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Total live channels across all recipients.
    pub fn connection_count(&self) -> usize {
        self.groups.iter().map(|group| group.len()).sum()
    }

    /// Recipients with at least one live channel.
    pub fn recipient_count(&self) -> usize {
        self.groups.len()
    }
}

/// Keeps one channel registered for as long as it is alive.
///
/// Dropping it unregisters the channel. Every way a connection can end
/// (clean close, I/O error, failed upgrade, task abort, panic) drops the
/// membership, so teardown always runs exactly once per connection.
pub struct Membership {
    registry: Arc<ChannelRegistry>,
    recipient: UserId,
    conn_id: ConnId,
}

impl Membership {
    pub fn register(registry: Arc<ChannelRegistry>, recipient: UserId, handle: ChannelHandle) -> Self {
        let conn_id = handle.id.clone();
        registry.register(&recipient, handle);
        Self {
            registry,
            recipient,
            conn_id,
        }
    }

    pub fn recipient(&self) -> &UserId {
        &self.recipient
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.registry.unregister(&self.recipient, &self.conn_id);
    }
}
