use std::fmt;

use eventhub_core::types::UserId;
use serde::{Deserialize, Serialize};

/// Open-ended notification category. The frontend styles the well-known
/// values; anything else is passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationKind(String);

impl NotificationKind {
    pub const INFO: &'static str = "info";
    pub const SUCCESS: &'static str = "success";
    pub const WARNING: &'static str = "warning";

    /// Blank input falls back to `info`.
    pub fn new(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        if kind.trim().is_empty() {
            Self::info()
        } else {
            Self(kind)
        }
    }

    pub fn info() -> Self {
        Self(Self::INFO.to_string())
    }

    pub fn success() -> Self {
        Self(Self::SUCCESS.to_string())
    }

    pub fn warning() -> Self {
        Self(Self::WARNING.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NotificationKind {
    fn default() -> Self {
        Self::info()
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NotificationKind {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A persisted notification.
///
/// The serde field names are the wire format shared by the REST history
/// endpoint and the WebSocket push payload:
/// `{ id, user, message, type, is_read, created_at }`.
///
/// Immutable once stored, except `read`, which only ever goes false → true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// UUIDv7 primary key.
    pub id: String,
    #[serde(rename = "user")]
    pub recipient: UserId,
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    #[serde(rename = "is_read", default)]
    pub read: bool,
    /// RFC3339 UTC with microseconds, so lexical order is chronological.
    pub created_at: String,
}

impl Notification {
    /// Serialize to the JSON text sent over push connections.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
