use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use eventhub_events::Team;
use eventhub_notifications::NotificationKind;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::http::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub event: String,
    pub team_name: String,
    pub max_size: Option<u32>,
}

/// POST /api/teams: the caller becomes leader and first member.
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Json(req): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<Team>), ApiError> {
    let team = state
        .events
        .create_team(&identity.user_id, &req.event, &req.team_name, req.max_size)?;
    Ok((StatusCode::CREATED, Json(team)))
}

/// GET /api/teams/{id}
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Team>, ApiError> {
    state
        .events
        .get_team(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Team not found"))
}

/// GET /api/teams/event/{event_id}
pub async fn event_teams_handler(
    State(state): State<Arc<AppState>>,
    _caller: AuthUser,
    Path(event_id): Path<String>,
) -> Result<Json<Vec<Team>>, ApiError> {
    Ok(Json(state.events.teams_for_event(&event_id)?))
}

/// GET /api/teams/my-team/{event_id}
pub async fn my_team_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(event_id): Path<String>,
) -> Result<Json<Team>, ApiError> {
    state
        .events
        .team_for_user(&identity.user_id, &event_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("You are not in a team for this event"))
}

/// POST /api/teams/{id}/join
///
/// Notifies the joiner and the team leader. Both notifications are best
/// effort; the join has already been committed.
pub async fn join_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let team = state.events.join_team(&id, &identity.user_id)?;

    state.trigger.notify_best_effort(
        &identity.user_id,
        &format!("You joined team '{}'", team.team_name),
        &NotificationKind::success(),
    );
    state.trigger.notify_best_effort(
        &team.leader,
        &format!("{} joined your team '{}'", identity.name, team.team_name),
        &NotificationKind::info(),
    );

    Ok(Json(json!({ "message": "Joined successfully" })))
}

/// DELETE /api/teams/{id}/leave
///
/// The leader is warned that a member left. The leader cannot leave.
pub async fn leave_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let team = state.events.leave_team(&id, &identity.user_id)?;

    state.trigger.notify_best_effort(
        &team.leader,
        &format!("{} left your team '{}'", identity.name, team.team_name),
        &NotificationKind::warning(),
    );

    Ok(Json(json!({ "message": "Left team successfully" })))
}
