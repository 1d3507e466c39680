use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use eventhub_core::types::Role;
use eventhub_events::Registration;
use eventhub_notifications::NotificationKind;
use serde::Deserialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::http::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub event: String,
}

/// POST /api/registrations: participants only.
///
/// On success the participant gets a confirmation notification. That
/// notification is best effort and never fails the registration.
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Registration>), ApiError> {
    if identity.role != Role::Participant {
        return Err(ApiError::forbidden("Only participants can register for events"));
    }
    let event = state
        .events
        .get_event(&req.event)?
        .ok_or_else(|| ApiError::not_found("Event not found"))?;

    let registration = state.events.register(&identity.user_id, &event.id)?;

    state.trigger.notify_best_effort(
        &identity.user_id,
        &format!("Successfully registered for {}", event.title),
        &NotificationKind::success(),
    );

    Ok((StatusCode::CREATED, Json(registration)))
}

/// GET /api/registrations/my
pub async fn my_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Vec<Registration>>, ApiError> {
    Ok(Json(state.events.registrations_for(&identity.user_id)?))
}

/// DELETE /api/registrations/{id}
pub async fn cancel_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.events.cancel_registration(&id, &identity.user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_state;
    use axum::response::IntoResponse;
    use eventhub_core::types::{Identity, UserId};
    use eventhub_events::NewEvent;

    #[tokio::test]
    async fn registering_notifies_the_participant() {
        let state = test_state();
        let event = state
            .events
            .create_event(
                &UserId::from("org"),
                NewEvent {
                    title: "Game Jam".to_string(),
                    ..NewEvent::default()
                },
            )
            .unwrap();
        let me = Identity::new("p1", "Pat", Role::Participant);

        let (status, _) = register_handler(
            State(state.clone()),
            AuthUser(me.clone()),
            Json(RegisterRequest { event: event.id.clone() }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        let inbox = state.notifications.list_for(&me.user_id, 50).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].message, "Successfully registered for Game Jam");
        assert_eq!(inbox[0].kind.as_str(), "success");

        let Json(mine) = my_handler(State(state.clone()), AuthUser(me.clone())).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].event, event.id);
    }

    #[tokio::test]
    async fn organizers_cannot_register() {
        let state = test_state();
        let err = register_handler(
            State(state),
            AuthUser(Identity::new("org", "Olga", Role::Organizer)),
            Json(RegisterRequest { event: "x".to_string() }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }
}
