use axum::{
    extract::{ws::Message, ws::WebSocket, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use eventhub_core::{config::MAX_INBOUND_BYTES, types::UserId};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::ws::registry::{ChannelHandle, Membership};

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub user_id: Option<String>,
}

impl ConnectQuery {
    /// The recipient identity, if present and non-blank. Identity is trusted
    /// as issued upstream; nothing is verified here.
    pub fn recipient(self) -> Option<UserId> {
        self.user_id.map(UserId::from).filter(|id| !id.is_blank())
    }
}

/// Axum handler: GET /ws/notifications?user_id=<id>.
///
/// Registers the channel before completing the upgrade, so a client that
/// sees its handshake succeed is already reachable by the broker. Requests
/// without an identity are refused with 403 and never registered.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(recipient) = query.recipient() else {
        warn!("push connection rejected: missing user_id");
        return StatusCode::FORBIDDEN.into_response();
    };

    let (handle, outbound) = ChannelHandle::new();
    let membership = Membership::register(Arc::clone(&state.registry), recipient, handle);

    // If the upgrade fails the callback is dropped unrun, which drops the
    // membership and unregisters the channel.
    ws.max_message_size(MAX_INBOUND_BYTES)
        .on_failed_upgrade(|e| warn!(error = %e, "push connection upgrade failed"))
        .on_upgrade(move |socket| run_connection(socket, membership, outbound, state))
}

/// Per-connection event loop: lives for the entire push session.
///
/// Connection lifecycle is linear: connecting (in [`ws_handler`]) →
/// registered (this loop) → closed (the `Membership` drops). There is no way
/// back to registered; a reconnect is a new connection with a new channel.
async fn run_connection(
    socket: WebSocket,
    membership: Membership,
    mut outbound: mpsc::UnboundedReceiver<Arc<str>>,
    state: Arc<AppState>,
) {
    let conn_id = membership.conn_id().to_string();
    info!(conn_id, recipient = %membership.recipient(), "push connection registered");

    let (mut tx, mut rx) = socket.split();
    let mut shutdown = state.shutdown.subscribe();

    // heartbeat pings surface dead transports even when nothing is published
    let heartbeat_secs = state.config.notifications.heartbeat_secs;
    let period = Duration::from_secs(heartbeat_secs.max(1));
    let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let reason = loop {
        tokio::select! {
            payload = outbound.recv() => {
                let Some(payload) = payload else { break "outbound queue closed" };
                if tx.send(Message::Text(payload.to_string().into())).await.is_err() {
                    break "write failed";
                }
            }

            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if tx.send(Message::Pong(data)).await.is_err() {
                            break "write failed";
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break "client closed",
                    Some(Err(e)) => {
                        debug!(conn_id, error = %e, "push connection read error");
                        break "read failed";
                    }
                    // push-only channel: anything else the client sends is ignored
                    Some(Ok(_)) => {}
                }
            }

            _ = tick.tick(), if heartbeat_secs > 0 => {
                if tx.send(Message::Ping(Default::default())).await.is_err() {
                    break "heartbeat failed";
                }
            }

            _ = shutdown.changed() => {
                let _ = tx.send(Message::Close(None)).await;
                break "server shutdown";
            }
        }
    };

    drop(membership);
    info!(conn_id, reason, "push connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{build_router, test_state};
    use eventhub_notifications::NotificationKind;
    use tokio_tungstenite::{connect_async, tungstenite};

    type Client = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn spawn_server() -> (std::net::SocketAddr, Arc<AppState>) {
        let state = test_state();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (addr, state)
    }

    async fn connect(addr: std::net::SocketAddr, user: &str) -> Client {
        let url = format!("ws://{addr}/ws/notifications?user_id={user}");
        let (client, _) = connect_async(url).await.expect("ws connect");
        client
    }

    async fn next_json(client: &mut Client) -> serde_json::Value {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .expect("timed out waiting for push")
                .expect("stream ended")
                .expect("ws error");
            if let tungstenite::Message::Text(text) = msg {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    async fn assert_silent(client: &mut Client) {
        let res = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
        assert!(res.is_err(), "expected no frame, got {res:?}");
    }

    async fn wait_for_connections(state: &AppState, expected: usize) {
        for _ in 0..100 {
            if state.registry.connection_count() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "registry never reached {expected} connections (now {})",
            state.registry.connection_count()
        );
    }

    #[tokio::test]
    async fn missing_user_id_is_rejected_without_registering() {
        let (addr, state) = spawn_server().await;

        let err = connect_async(format!("ws://{addr}/ws/notifications"))
            .await
            .expect_err("handshake should be refused");
        match err {
            tungstenite::Error::Http(resp) => assert_eq!(resp.status(), 403),
            other => panic!("unexpected error: {other:?}"),
        }

        let blank = connect_async(format!("ws://{addr}/ws/notifications?user_id=%20"))
            .await;
        assert!(blank.is_err());
        assert_eq!(state.registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn two_tabs_receive_until_one_disconnects() {
        let (addr, state) = spawn_server().await;
        let mut tab_a = connect(addr, "u1").await;
        let mut tab_b = connect(addr, "u1").await;
        let mut stranger = connect(addr, "u2").await;
        wait_for_connections(&state, 3).await;

        let u1 = UserId::from("u1");
        state
            .trigger
            .notify(&u1, "hello", &NotificationKind::info())
            .unwrap();

        for tab in [&mut tab_a, &mut tab_b] {
            let got = next_json(tab).await;
            assert_eq!(got["user"], "u1");
            assert_eq!(got["message"], "hello");
            assert_eq!(got["type"], "info");
            assert_eq!(got["is_read"], false);
        }
        assert_silent(&mut stranger).await;

        tab_a.close(None).await.unwrap();
        wait_for_connections(&state, 2).await;

        state
            .trigger
            .notify(&u1, "again", &NotificationKind::info())
            .unwrap();
        assert_eq!(next_json(&mut tab_b).await["message"], "again");
        assert_eq!(state.registry.channels_for(&u1).len(), 1);
    }

    #[tokio::test]
    async fn pushes_arrive_in_publish_order() {
        let (addr, state) = spawn_server().await;
        let mut client = connect(addr, "u1").await;
        wait_for_connections(&state, 1).await;

        let u1 = UserId::from("u1");
        for i in 0..20 {
            state.broker.publish(&u1, format!(r#"{{"seq":{i}}}"#));
        }
        for i in 0..20 {
            assert_eq!(next_json(&mut client).await["seq"], i);
        }
    }

    #[tokio::test]
    async fn server_shutdown_closes_and_unregisters() {
        let (addr, state) = spawn_server().await;
        let mut client = connect(addr, "u1").await;
        wait_for_connections(&state, 1).await;

        state.shutdown.send_replace(true);

        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(msg) = client.next().await {
                if matches!(msg, Ok(tungstenite::Message::Close(_)) | Err(_)) {
                    break;
                }
            }
        })
        .await;
        assert!(closed.is_ok());
        wait_for_connections(&state, 0).await;
    }

    #[tokio::test]
    async fn abrupt_disconnect_unregisters_only_that_channel() {
        let (addr, state) = spawn_server().await;
        let dropped = connect(addr, "u1").await;
        let mut survivor = connect(addr, "u1").await;
        wait_for_connections(&state, 2).await;

        // no Close frame: the TCP stream just goes away
        drop(dropped);
        wait_for_connections(&state, 1).await;

        let u1 = UserId::from("u1");
        let outcome = state.broker.publish(&u1, r#"{"seq":1}"#);
        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.pruned, 0);
        assert_eq!(next_json(&mut survivor).await["seq"], 1);
    }

    #[tokio::test]
    async fn publishing_into_a_vanished_client_converges_to_unregistered() {
        let (addr, state) = spawn_server().await;
        let client = connect(addr, "u1").await;
        wait_for_connections(&state, 1).await;
        drop(client);

        // keep the relay writing while the transport dies underneath it
        let u1 = UserId::from("u1");
        for i in 0..200 {
            state.broker.publish(&u1, format!(r#"{{"seq":{i}}}"#));
            if state.registry.connection_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        wait_for_connections(&state, 0).await;
        assert!(state.registry.channels_for(&u1).is_empty());
        assert_eq!(state.broker.publish(&u1, "late").delivered, 0);
    }

    #[test]
    fn blank_query_has_no_recipient() {
        let q = ConnectQuery { user_id: Some("  ".to_string()) };
        assert!(q.recipient().is_none());
        assert!(ConnectQuery { user_id: None }.recipient().is_none());
        assert_eq!(
            ConnectQuery { user_id: Some("u1".to_string()) }.recipient(),
            Some(UserId::from("u1"))
        );
    }
}
