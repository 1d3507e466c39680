use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Team not found: {0}")]
    TeamNotFound(String),

    #[error("Registration not found: {0}")]
    RegistrationNotFound(String),

    #[error("Already registered for this event")]
    AlreadyRegistered,

    #[error("Event is full")]
    EventFull,

    #[error("You must register for the event first")]
    NotRegistered,

    #[error("You are already in a team for this event")]
    AlreadyInTeam,

    #[error("Team is full")]
    TeamFull,

    #[error("You are not in this team")]
    NotInTeam,

    #[error("Leader cannot leave the team")]
    LeaderCannotLeave,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, EventError>;
