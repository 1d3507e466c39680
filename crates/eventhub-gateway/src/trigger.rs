//! Persist-then-push orchestration used by every business operation that
//! notifies someone.
//!
//! The store write is the only part that can fail the caller. Pushing to
//! live connections happens afterwards and its outcome is logged, never
//! returned: a recipient without an open socket simply reads the record
//! from the history endpoint later.

use std::sync::Arc;

use eventhub_core::types::UserId;
use eventhub_notifications::{Notification, NotificationKind, NotificationStore};
use serde::Serialize;
use tracing::{debug, warn};

use crate::ws::broker::DeliveryBroker;

/// Result of a multi-recipient notification.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Recipients processed: the count reported back to the organizer.
    pub recipients: usize,
    /// Notifications successfully stored.
    pub persisted: usize,
    /// Recipients whose notification could not be stored.
    pub failed: usize,
}

#[derive(Clone)]
pub struct NotificationTrigger {
    store: Arc<NotificationStore>,
    broker: DeliveryBroker,
}

impl NotificationTrigger {
    pub fn new(store: Arc<NotificationStore>, broker: DeliveryBroker) -> Self {
        Self { store, broker }
    }

    /// Store a notification for `recipient`, then push it to their live
    /// connections. Only the store write can fail this call.
    pub fn notify(
        &self,
        recipient: &UserId,
        message: &str,
        kind: &NotificationKind,
    ) -> eventhub_notifications::Result<Notification> {
        let notification = self.store.create(recipient, message, kind)?;

        match notification.to_payload() {
            Ok(payload) => {
                let outcome = self.broker.publish(recipient, payload);
                debug!(
                    id = %notification.id,
                    delivered = outcome.delivered,
                    "notification pushed"
                );
            }
            Err(e) => {
                warn!(id = %notification.id, error = %e, "notification push skipped: payload encoding failed");
            }
        }

        Ok(notification)
    }

    /// [`notify`](Self::notify) for side-effect call sites: a failure is
    /// logged and swallowed so the surrounding operation still succeeds.
    pub fn notify_best_effort(
        &self,
        recipient: &UserId,
        message: &str,
        kind: &NotificationKind,
    ) -> Option<Notification> {
        match self.notify(recipient, message, kind) {
            Ok(notification) => Some(notification),
            Err(e) => {
                warn!(recipient = %recipient, error = %e, "notification failed");
                None
            }
        }
    }

    /// Notify each recipient independently. A failure for one recipient is
    /// logged and counted; the rest are still processed.
    pub fn notify_many<'a>(
        &self,
        recipients: impl IntoIterator<Item = &'a UserId>,
        message: &str,
        kind: &NotificationKind,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for recipient in recipients {
            report.recipients += 1;
            match self.notify(recipient, message, kind) {
                Ok(_) => report.persisted += 1,
                Err(e) => {
                    warn!(recipient = %recipient, error = %e, "broadcast notification failed");
                    report.failed += 1;
                }
            }
        }
        report
    }
}
