//! Route table.

use axum::Router;
use axum::routing::{get, post};

use feedback_core::error::AppError;

use crate::error::ApiError;
use crate::handlers::{health, notify, ws};
use crate::state::AppState;

/// Builds the router with every route bound to the shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/chat", get(ws::chat_ws))
        .route("/ws/notifications", get(ws::notification_ws))
        .route("/internal/notify", post(notify::notify))
        .route("/health", get(health::health))
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> ApiError {
    AppError::not_found("Route not found").into()
}
