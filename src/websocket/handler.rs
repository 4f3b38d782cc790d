use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::auth::Identity;
use crate::error::AuthError;
use crate::models::{ClientEvent, ServerEvent};
use crate::services::auth_service::get_auth_token;
use crate::state::AppState;
use crate::websocket::msg_ping_handler::handle_ping_message;
use crate::websocket::msg_room_handler::handle_room_message;
use crate::ws::{ConnCtx, Outbound};

/// Handshake parameters carried in the upgrade URL.
#[derive(Debug, Deserialize)]
pub struct HandshakeParams {
    pub token: Option<String>,
}

/// WebSocket handler. The token is checked before the upgrade, so a bad
/// handshake never becomes a connection.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HandshakeParams>,
) -> Response {
    debug!("New WebSocket connection attempt");

    let token = match get_auth_token(&headers, params.token.as_deref()) {
        Ok(token) => token,
        Err(e) => {
            warn!("WebSocket handshake rejected: {}", e);
            return (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
        }
    };

    let identity = match state.verifier.verify(&token) {
        Ok(identity) => identity,
        Err(AuthError::NotConfigured) => {
            error!("WebSocket handshake rejected: JWT secret not configured");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Authentication is not configured").into_response();
        }
        Err(e) => {
            warn!("WebSocket handshake rejected: {}", e);
            return (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
        }
    };

    if !identity.is_user() {
        warn!("WebSocket handshake rejected for {}: not a user token", identity.principal());
        return (StatusCode::FORBIDDEN, "A user token is required").into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, identity, state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, identity: Identity, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let conn = state.hub.register(&identity.subject, tx).await;
    let conn_id = conn.id;

    let ping_every = state.config.ws_ping_interval();
    let idle_timeout = state.config.ws_idle_timeout();

    // Writer: drains the connection queue and keeps the transport alive
    let mut send_task = tokio::spawn(async move {
        let mut ping = interval_at(Instant::now() + ping_every, ping_every);
        ping.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                item = rx.recv() => match item {
                    Some(Outbound::Text(text)) => {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close) => {
                        let frame = CloseFrame {
                            code: close_code::NORMAL,
                            reason: Cow::from("server disconnect"),
                        };
                        if let Err(e) = sender.send(Message::Close(Some(frame))).await {
                            debug!("Failed to send close frame on {}: {}", conn_id, e);
                        }
                        break;
                    }
                    None => break,
                },
                _ = ping.tick() => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Reader: client frames, bounded by the liveness timeout
    let recv_state = state.clone();
    let recv_conn = conn.clone();
    let mut recv_task = tokio::spawn(async move {
        loop {
            let frame = match tokio::time::timeout(idle_timeout, receiver.next()).await {
                Err(_) => {
                    info!("Connection {} silent for {:?}, dropping", recv_conn.id, idle_timeout);
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    warn!("WebSocket error on {}: {}", recv_conn.id, e);
                    break;
                }
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                Message::Text(text) => handle_text_message(&recv_state, &recv_conn, &text).await,
                Message::Binary(_) => {
                    recv_conn.send(&ServerEvent::error("binary frames are not supported"));
                }
                Message::Close(_) => break,
                // Transport-level keepalive; the timeout above already counted it
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    // Wait for either task to finish (and finish the other)
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    state.hub.unregister(conn_id).await;
    info!("WebSocket connection {} for user {} terminated", conn_id, identity.subject);
}

async fn handle_text_message(state: &AppState, conn: &ConnCtx, text: &str) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!("Failed to parse message on {}: {}", conn.id, e);
            conn.send(&ServerEvent::error(format!("invalid message: {}", e)));
            return;
        }
    };

    debug!("Received {} on {}", event.event_name(), conn.id);
    match event {
        ClientEvent::Ping => handle_ping_message(conn),
        other => handle_room_message(&state.hub, conn, &other).await,
    }
}
