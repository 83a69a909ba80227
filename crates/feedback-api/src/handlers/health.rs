//! Health check handler.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Liveness plus hub counters.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `"ok"` when both hubs answer.
    pub status: &'static str,
    /// Open chat connections.
    pub chat_connections: usize,
    /// Open notification connections.
    pub notification_connections: usize,
    /// Whether staff chat is currently delivered.
    pub chat_open: bool,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let chat = state.realtime.chat_snapshot().await?;
    let notifications = state.realtime.notification_snapshot().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        chat_connections: chat.connections,
        notification_connections: notifications.connections,
        chat_open: chat.chat_open,
    }))
}
