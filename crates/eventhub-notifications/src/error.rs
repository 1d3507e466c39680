use thiserror::Error;

/// Errors that can occur during notification store operations.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Every notification must be addressed to a non-blank user id.
    #[error("invalid recipient: {0:?}")]
    InvalidRecipient(String),

    /// The message text is required.
    #[error("notification message must not be empty")]
    EmptyMessage,

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, NotificationError>;
