use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use eventhub_core::EventhubError;
use eventhub_events::EventError;
use eventhub_notifications::NotificationError;
use serde_json::json;
use tracing::error;

/// Error body for every REST handler: `{"error": "<message>"}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Log the detail, return a generic 500.
    fn internal(detail: impl std::fmt::Display) -> Self {
        error!(error = %detail, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<EventhubError> for ApiError {
    fn from(e: EventhubError) -> Self {
        match e {
            EventhubError::AuthFailed(_) | EventhubError::TokenExpired => {
                Self::unauthorized(e.to_string())
            }
            EventhubError::Config(_) | EventhubError::TokenIssue(_) => Self::internal(e),
        }
    }
}

impl From<NotificationError> for ApiError {
    fn from(e: NotificationError) -> Self {
        match e {
            NotificationError::InvalidRecipient(_) | NotificationError::EmptyMessage => {
                Self::bad_request(e.to_string())
            }
            NotificationError::Database(_) => Self::internal(e),
        }
    }
}

impl From<EventError> for ApiError {
    fn from(e: EventError) -> Self {
        match e {
            EventError::EventNotFound(_)
            | EventError::TeamNotFound(_)
            | EventError::RegistrationNotFound(_) => Self::not_found(e.to_string()),
            EventError::PermissionDenied(_) => Self::forbidden(e.to_string()),
            EventError::AlreadyRegistered
            | EventError::EventFull
            | EventError::NotRegistered
            | EventError::AlreadyInTeam
            | EventError::TeamFull
            | EventError::NotInTeam
            | EventError::LeaderCannotLeave
            | EventError::InvalidInput(_) => Self::bad_request(e.to_string()),
            EventError::Database(_) => Self::internal(e),
        }
    }
}
