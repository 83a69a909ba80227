//! Application state shared across all handlers.

use std::sync::Arc;

use feedback_auth::JwtDecoder;
use feedback_core::config::AppConfig;
use feedback_database::{MessageStore, UserDirectory};
use feedback_realtime::{RealtimeEngine, WsAuthenticator};

/// Shared application state, cloned into every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Hubs and persistence sink.
    pub realtime: Arc<RealtimeEngine>,
    /// Pre-upgrade token and login-state check.
    pub authenticator: Arc<WsAuthenticator>,
}

impl AppState {
    /// Start the real-time engine and wire the authenticator.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn MessageStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        let decoder = Arc::new(JwtDecoder::new(&config.auth));
        let authenticator = Arc::new(WsAuthenticator::new(decoder, users));
        let realtime = Arc::new(RealtimeEngine::start(
            &config.realtime,
            &config.persistence,
            store,
        ));

        Self {
            config: Arc::new(config),
            realtime,
            authenticator,
        }
    }
}
