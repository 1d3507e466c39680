//! `eventhub-notifications`: durable per-recipient notification records.
//!
//! The store only persists. Pushing a freshly created record to live
//! connections is the caller's job (see the gateway's trigger module), so a
//! delivery problem can never roll back or fail a write here.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{NotificationError, Result};
pub use store::NotificationStore;
pub use types::{Notification, NotificationKind};
