//! `eventhub-events`: events, registrations and teams.
//!
//! Plain persistence with the business checks (capacity, duplicate
//! registration, one team per event) applied inside a single SQLite
//! transaction. Notifying users about these changes is left to callers.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{EventError, Result};
pub use store::EventStore;
pub use types::{Event, EventFilter, EventUpdate, NewEvent, Registration, Team, DEFAULT_TEAM_SIZE};
