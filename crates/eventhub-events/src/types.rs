use eventhub_core::types::UserId;
use serde::{Deserialize, Serialize};

/// Team size used when the creator does not pick one.
pub const DEFAULT_TEAM_SIZE: u32 = 4;

/// Organizer-supplied fields for a new event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    /// `None` means no capacity limit.
    pub max_participants: Option<u32>,
}

/// Partial update applied by the owning organizer. Absent fields are left
/// as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub max_participants: Option<u32>,
}

/// Public event listing filters. `search` matches the title,
/// case-insensitively.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub category: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub organizer: UserId,
    pub max_participants: Option<u32>,
    pub created_at: String,
}

impl Event {
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.organizer == user
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: String,
    pub user: UserId,
    pub event: String,
    pub status: String,
    pub registered_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub event: String,
    pub team_name: String,
    pub leader: UserId,
    /// Join order; the leader is always first.
    pub members: Vec<UserId>,
    pub max_size: u32,
    pub created_at: String,
}

impl Team {
    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_size as usize
    }

    pub fn has_member(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }
}
