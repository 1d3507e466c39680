use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use eventhub_core::types::UserId;
use eventhub_events::{Event, EventFilter, EventUpdate, NewEvent};
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::http::error::ApiError;

/// GET /api/events?category=&status=&search=
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<EventFilter>,
) -> Result<Json<Vec<Event>>, ApiError> {
    Ok(Json(state.events.list_events(&filter)?))
}

/// GET /api/events/my-events: the caller's own events.
pub async fn my_events_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Vec<Event>>, ApiError> {
    if !identity.is_organizer() {
        return Err(ApiError::forbidden("Only organizers have events"));
    }
    Ok(Json(state.events.organizer_events(&identity.user_id)?))
}

/// GET /api/events/{id}
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    state
        .events
        .get_event(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Event not found"))
}

/// POST /api/events: organizers only.
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Json(new): Json<NewEvent>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    if !identity.is_organizer() {
        return Err(ApiError::forbidden("Only organizers can create events"));
    }
    let event = state.events.create_event(&identity.user_id, new)?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// PUT /api/events/{id}: the owning organizer only.
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
    Json(update): Json<EventUpdate>,
) -> Result<Json<Event>, ApiError> {
    if !identity.is_organizer() {
        return Err(ApiError::forbidden("Only organizers can edit events"));
    }
    Ok(Json(state.events.update_event(&id, &identity.user_id, update)?))
}

/// DELETE /api/events/{id}: the owning organizer only.
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !identity.is_organizer() {
        return Err(ApiError::forbidden("Only organizers can delete events"));
    }
    state.events.delete_event(&id, &identity.user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/events/{id}/participants: the owning organizer only.
pub async fn participants_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<UserId>>, ApiError> {
    let event = state
        .events
        .get_event(&id)?
        .filter(|event| event.is_owned_by(&identity.user_id))
        .ok_or_else(|| ApiError::forbidden("Permission denied"))?;
    Ok(Json(state.events.registrants(&event.id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_state;
    use axum::response::IntoResponse;
    use eventhub_core::types::{Identity, Role};

    fn organizer(id: &str) -> Identity {
        Identity::new(id, "Olga", Role::Organizer)
    }

    #[tokio::test]
    async fn list_filters_by_query() {
        let state = test_state();
        let org = organizer("org");
        for (title, category) in [("Rust Conf", "tech"), ("Choir", "music")] {
            create_handler(
                State(state.clone()),
                AuthUser(org.clone()),
                Json(NewEvent {
                    title: title.to_string(),
                    category: Some(category.to_string()),
                    ..NewEvent::default()
                }),
            )
            .await
            .unwrap();
        }

        let Json(found) = list_handler(
            State(state.clone()),
            Query(EventFilter { search: Some("rust".into()), ..EventFilter::default() }),
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Rust Conf");
    }

    #[tokio::test]
    async fn only_the_owner_edits_or_deletes() {
        let state = test_state();
        let owner = organizer("org");
        let rival = organizer("rival");
        let (_, Json(event)) = create_handler(
            State(state.clone()),
            AuthUser(owner.clone()),
            Json(NewEvent { title: "Expo".to_string(), ..NewEvent::default() }),
        )
        .await
        .unwrap();

        let err = update_handler(
            State(state.clone()),
            AuthUser(rival.clone()),
            Path(event.id.clone()),
            Json(EventUpdate::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

        let err = delete_handler(State(state.clone()), AuthUser(rival), Path(event.id.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

        let Json(updated) = update_handler(
            State(state.clone()),
            AuthUser(owner.clone()),
            Path(event.id.clone()),
            Json(EventUpdate { status: Some("completed".into()), ..EventUpdate::default() }),
        )
        .await
        .unwrap();
        assert_eq!(updated.status.as_deref(), Some("completed"));

        let Json(mine) = my_events_handler(State(state.clone()), AuthUser(owner.clone()))
            .await
            .unwrap();
        assert_eq!(mine, vec![updated]);

        let status = delete_handler(State(state.clone()), AuthUser(owner), Path(event.id.clone()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state.events.get_event(&event.id).unwrap().is_none());
    }
}
