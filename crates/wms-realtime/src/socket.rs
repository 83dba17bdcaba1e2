//! The WebSocket upgrade endpoint and per-connection dispatch loop
//! Socket session lifecycle: handshake, broadcast routing, close.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket},
    extract::{Query, State, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use wms_core::WmsError;

use crate::auth::{authenticate, extract_token, Identity};
use crate::policy::should_deliver;
use crate::presence_events::{presence_changed_envelope, user_list_envelope};
use crate::state::RealtimeState;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

pub fn build_router(state: RealtimeState) -> Router {
    Router::new()
        .route("/ws", get(upgrade))
        .with_state(Arc::new(state))
}

async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RealtimeState>>,
    headers: HeaderMap,
    Query(query): Query<WsAuthQuery>,
) -> Response {
    // Axum upgrades before the socket exchanges any frames, so "handshake
    // auth" and the query string are the same source here; the header
    // remains available as the third.
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = match extract_token(query.token.as_deref(), auth_header, query.token.as_deref()) {
        Some(t) => t,
        None => return error_response(WmsError::unauthorized("missing realtime auth token")),
    };

    let secret = match &state.jwt_secret {
        Some(s) => s.clone(),
        None => {
            return error_response(WmsError::unauthorized("realtime auth is not configured"))
        }
    };

    let identity = match authenticate(&token, &secret) {
        Ok(identity) => identity,
        Err(e) => return error_response(e),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, identity, state))
}

async fn handle_socket(socket: WebSocket, identity: Identity, state: Arc<RealtimeState>) {
    let socket_id = Uuid::new_v4();
    let presence_key = identity.presence_key();
    let room = identity.room();

    let became_online = state.presence.connect(&presence_key, socket_id);
    info!(room = %room, socket_id = %socket_id, "realtime socket connected");

    if became_online && !identity.is_manager() {
        broadcast_presence(&state, &presence_key, true);
    }

    let mut rx = state.events.subscribe();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(error = %e, socket_id = %socket_id, "realtime socket read error");
                        break;
                    }
                }
            }
            event = rx.recv() => {
                match event {
                    Ok(envelope) => {
                        if !should_deliver(&identity, &envelope) {
                            continue;
                        }
                        let Ok(body) = serde_json::to_string(&envelope) else { continue };
                        if sink.send(Message::Text(body)).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(socket_id = %socket_id, skipped, "realtime socket lagged, dropping events");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    let went_offline = state.presence.disconnect(&presence_key, socket_id);
    let _ = sink.close().await;
    info!(room = %room, socket_id = %socket_id, "realtime socket closed");

    if went_offline && !identity.is_manager() {
        broadcast_presence(&state, &presence_key, false);
    }
}

fn broadcast_presence(state: &RealtimeState, user_key: &str, online: bool) {
    let now = chrono::Utc::now();
    let _ = state.events.send(presence_changed_envelope(user_key, online, now));
    let _ = state
        .events
        .send(user_list_envelope(state.presence.active_user_keys(), now));
}

fn error_response(err: WmsError) -> Response {
    let status =
        StatusCode::from_u16(err.class.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(serde_json::json!({ "error": err.message }))).into_response()
}
