//! Application builder and server lifecycle.

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use feedback_core::config::{AppConfig, CorsConfig};
use feedback_core::error::AppError;
use feedback_database::{MessageStore, UserDirectory};

use crate::middleware::cors::build_cors_layer;
use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState, cors_config: &CorsConfig) -> Router {
    build_router(state)
        .layer(build_cors_layer(cors_config))
        .layer(TraceLayer::new_for_http())
}

/// Runs the server until Ctrl+C.
///
/// On the signal the hubs stop first, which closes every open socket, so
/// the graceful shutdown is not held up by long-lived connections.
pub async fn run_server(
    config: AppConfig,
    store: Arc<dyn MessageStore>,
    users: Arc<dyn UserDirectory>,
) -> Result<(), AppError> {
    let addr = config.server.bind_address();
    let cors = config.server.cors.clone();

    let state = AppState::new(config, store, users);
    let realtime = Arc::clone(&state.realtime);
    let app = build_app(state, &cors);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    info!("Feedback server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            realtime.shutdown().await;
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
