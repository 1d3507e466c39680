//! Notification REST endpoints.
//!
//! - `GET  /api/notifications`            own history, newest first
//! - `PUT  /api/notifications/{id}/read`  mark one read
//! - `PUT  /api/notifications/read-all`   mark all read
//! - `POST /api/notifications/send`       organizer broadcast to registrants
//!
//! The history endpoint doubles as the catch-up path for clients that were
//! offline: pushes are never replayed on reconnect.

use axum::{
    extract::{Path, State},
    Json,
};
use eventhub_notifications::{Notification, NotificationKind};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::http::error::ApiError;

/// GET /api/notifications
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let limit = state.config.notifications.list_limit;
    let notifications = state.notifications.list_for(&identity.user_id, limit)?;
    Ok(Json(notifications))
}

/// PUT /api/notifications/{id}/read
pub async fn mark_read_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let notification = state
        .notifications
        .get(&id)?
        .ok_or_else(|| ApiError::not_found("Not found"))?;

    if notification.recipient != identity.user_id {
        return Err(ApiError::forbidden("Permission denied"));
    }

    if !state.notifications.mark_read(&id)? {
        return Err(ApiError::not_found("Not found"));
    }
    Ok(Json(json!({ "message": "Marked read" })))
}

/// PUT /api/notifications/read-all
pub async fn mark_all_read_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let updated = state.notifications.mark_all_read(&identity.user_id)?;
    Ok(Json(json!({ "message": "All marked read", "updated": updated })))
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub event_id: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// POST /api/notifications/send: organizer broadcast to every registrant
/// of one of their events.
///
/// The reported count is the number of registrants processed, independent
/// of how many of them had a live connection.
pub async fn send_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Json(req): Json<SendRequest>,
) -> Result<Json<Value>, ApiError> {
    if !identity.is_organizer() {
        return Err(ApiError::forbidden("Only organizers can send notifications"));
    }

    let event_id = req.event_id.filter(|s| !s.trim().is_empty());
    let message = req.message.filter(|s| !s.trim().is_empty());
    let (Some(event_id), Some(message)) = (event_id, message) else {
        return Err(ApiError::bad_request("Event ID and message required"));
    };
    let kind = req.kind.map(NotificationKind::from).unwrap_or_default();

    let event = state
        .events
        .get_event(&event_id)?
        .filter(|event| event.is_owned_by(&identity.user_id))
        .ok_or_else(|| ApiError::forbidden("Event not found or permission denied"))?;

    let registrants = state.events.registrants(&event.id)?;
    let report = state.trigger.notify_many(&registrants, &message, &kind);
    info!(
        event_id = %event.id,
        recipients = report.recipients,
        failed = report.failed,
        "organizer broadcast sent"
    );

    Ok(Json(json!({
        "message": format!("Notification sent to {} participants.", report.recipients),
        "report": report,
    })))
}
