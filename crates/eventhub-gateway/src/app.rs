use axum::{
    routing::{delete, get, post, put},
    Router,
};
use eventhub_core::config::EventhubConfig;
use eventhub_events::EventStore;
use eventhub_notifications::NotificationStore;
use std::sync::Arc;
use tokio::sync::watch;

use crate::trigger::NotificationTrigger;
use crate::ws::{broker::DeliveryBroker, registry::ChannelRegistry};

/// Central shared state: passed as Arc<AppState> to all Axum handlers.
///
/// Created once at startup and lives until the process exits. The registry
/// is shared by reference with the broker (and through it the trigger), so
/// all three see the same set of live connections.
pub struct AppState {
    pub config: EventhubConfig,
    pub notifications: Arc<NotificationStore>,
    pub events: EventStore,
    /// Live push connections: recipient -> channels.
    pub registry: Arc<ChannelRegistry>,
    pub broker: DeliveryBroker,
    pub trigger: NotificationTrigger,
    /// Flipped to `true` once on shutdown; every push connection watches it.
    pub shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(config: EventhubConfig, notifications: NotificationStore, events: EventStore) -> Self {
        let notifications = Arc::new(notifications);
        let registry = Arc::new(ChannelRegistry::new());
        let broker = DeliveryBroker::new(Arc::clone(&registry));
        let trigger = NotificationTrigger::new(Arc::clone(&notifications), broker.clone());
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            notifications,
            events,
            registry,
            broker,
            trigger,
            shutdown,
        }
    }

    /// Ask every push connection to close.
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    use crate::http::{events, health, notifications, registrations, teams};

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/ws/notifications", get(crate::ws::connection::ws_handler))
        .route("/api/notifications", get(notifications::list_handler))
        .route("/api/notifications/send", post(notifications::send_handler))
        .route("/api/notifications/read-all", put(notifications::mark_all_read_handler))
        .route("/api/notifications/{id}/read", put(notifications::mark_read_handler))
        .route("/api/events", get(events::list_handler).post(events::create_handler))
        .route("/api/events/my-events", get(events::my_events_handler))
        .route(
            "/api/events/{id}",
            get(events::get_handler)
                .put(events::update_handler)
                .delete(events::delete_handler),
        )
        .route("/api/events/{id}/participants", get(events::participants_handler))
        .route("/api/registrations", post(registrations::register_handler))
        .route("/api/registrations/my", get(registrations::my_handler))
        .route("/api/registrations/{id}", delete(registrations::cancel_handler))
        .route("/api/teams", post(teams::create_handler))
        .route("/api/teams/event/{event_id}", get(teams::event_teams_handler))
        .route("/api/teams/my-team/{event_id}", get(teams::my_team_handler))
        .route("/api/teams/{id}", get(teams::get_handler))
        .route("/api/teams/{id}/join", post(teams::join_handler))
        .route("/api/teams/{id}/leave", delete(teams::leave_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
}

/// In-memory state with the heartbeat disabled, for handler and socket tests.
#[cfg(test)]
pub(crate) fn test_state() -> Arc<AppState> {
    let notifications_db = rusqlite::Connection::open_in_memory().unwrap();
    eventhub_notifications::db::init_db(&notifications_db).unwrap();
    let events_db = rusqlite::Connection::open_in_memory().unwrap();
    events_db.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    eventhub_events::db::init_db(&events_db).unwrap();

    let mut config = EventhubConfig::default();
    config.gateway.auth.secret = "test-secret".to_string();
    config.notifications.heartbeat_secs = 0;

    Arc::new(AppState::new(
        config,
        NotificationStore::new(notifications_db),
        EventStore::new(events_db),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_reports_live_connections() {
        let state = test_state();
        let (handle, _rx) = crate::ws::registry::ChannelHandle::new();
        state.registry.register(&"u1".into(), handle);

        let response = build_router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .expect("request failed");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["ws_connections"], 1);
        assert_eq!(json["ws_recipients"], 1);
    }

    #[tokio::test]
    async fn fixed_segments_win_over_id_routes() {
        let state = test_state();
        let auth = &state.config.gateway.auth;
        let organizer = eventhub_core::types::Identity::new(
            "org",
            "Olga",
            eventhub_core::types::Role::Organizer,
        );
        let token = crate::auth::issue_token(&auth.secret, &organizer, auth.token_ttl_secs).unwrap();

        let get = |uri: &'static str| {
            let router = build_router(Arc::clone(&state));
            let token = token.clone();
            async move {
                let response = router
                    .oneshot(
                        Request::builder()
                            .uri(uri)
                            .header("authorization", format!("Bearer {token}"))
                            .body(Body::empty())
                            .unwrap(),
                    )
                    .await
                    .unwrap();
                let status = response.status();
                let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
                (status, serde_json::from_slice::<serde_json::Value>(&body).unwrap())
            }
        };

        let (status, body) = get("/api/events/my-events").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));

        let (status, body) = get("/api/registrations/my").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));

        let (status, body) = get("/api/teams/my-team/some-event").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "You are not in a team for this event");
    }
}
