use std::sync::Arc;

use eventhub_core::types::UserId;
use tracing::{debug, warn};

use crate::ws::registry::ChannelRegistry;

/// What one `publish` did. Purely informational; offline recipients and
/// pruned channels are normal outcomes, not errors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Channels whose outbound queue accepted the payload.
    pub delivered: usize,
    /// Dead channels removed from the registry during this call.
    pub pruned: usize,
}

/// Fan-out of one payload to every live channel of a recipient.
#[derive(Clone)]
pub struct DeliveryBroker {
    registry: Arc<ChannelRegistry>,
}

impl DeliveryBroker {
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }

    /// Push `payload` to every channel registered for `recipient`.
    ///
    /// Works on a registry snapshot, so no lock is held while pushing. A push
    /// only enqueues, so it never waits on a slow socket. A channel whose
    /// connection is gone is unregistered and skipped; the remaining channels
    /// still receive the payload.
    pub fn publish(&self, recipient: &UserId, payload: impl Into<Arc<str>>) -> PublishOutcome {
        let payload = payload.into();
        let mut outcome = PublishOutcome::default();

        for channel in self.registry.channels_for(recipient) {
            match channel.push(Arc::clone(&payload)) {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    warn!(recipient = %recipient, error = %e, "pruning dead push channel");
                    if self.registry.unregister(recipient, channel.id()) {
                        outcome.pruned += 1;
                    }
                }
            }
        }

        debug!(
            recipient = %recipient,
            delivered = outcome.delivered,
            pruned = outcome.pruned,
            "publish complete"
        );
        outcome
    }
}
