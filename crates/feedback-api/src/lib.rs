//! # feedback-api
//!
//! HTTP layer for the feedback service built on Axum.
//!
//! Provides the chat and notification WebSocket upgrades (authenticated
//! before the handshake completes), the internal notification trigger,
//! a health check, CORS, and error mapping.

pub mod app;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, run_server};
pub use error::ApiError;
pub use state::AppState;
