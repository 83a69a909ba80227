//! WebSocket upgrade handlers.
//!
//! Authentication runs before the handshake is accepted, so a rejected
//! request never creates a connection or touches a hub.

use axum::extract::ws::WebSocket;
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use serde::Deserialize;
use tracing::warn;

use feedback_realtime::Identity;

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameter for WebSocket authentication.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT access token.
    pub token: Option<String>,
}

/// GET /ws/chat?token={jwt}
pub async fn chat_ws(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let identity = state
        .authenticator
        .authenticate(query.token.as_deref())
        .await?;

    Ok(ws.on_upgrade(move |socket| serve_chat(state, identity, socket)))
}

/// GET /ws/notifications?token={jwt}
pub async fn notification_ws(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let identity = state
        .authenticator
        .authenticate(query.token.as_deref())
        .await?;

    Ok(ws.on_upgrade(move |socket| serve_notifications(state, identity, socket)))
}

async fn serve_chat(state: AppState, identity: Identity, socket: WebSocket) {
    let user_id = identity.user_id.clone();
    if let Err(e) = state.realtime.serve_chat(socket, identity).await {
        warn!(user_id = %user_id, error = %e, "Chat connection refused after upgrade");
    }
}

async fn serve_notifications(state: AppState, identity: Identity, socket: WebSocket) {
    let user_id = identity.user_id.clone();
    if let Err(e) = state.realtime.serve_notifications(socket, identity).await {
        warn!(user_id = %user_id, error = %e, "Notification connection refused after upgrade");
    }
}
