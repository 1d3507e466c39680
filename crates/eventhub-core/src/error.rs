use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventhubError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token could not be issued: {0}")]
    TokenIssue(String),
}

pub type Result<T> = std::result::Result<T, EventhubError>;
