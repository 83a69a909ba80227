//! Feedback Server: real-time staff chat and user notifications.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use feedback_core::config::AppConfig;
use feedback_core::error::AppError;
use feedback_database::{DatabasePool, MessageRepository, UserRepository};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load `config/default.toml`, the `FEEDBACK_ENV` overlay, and `FEEDBACK__*` variables.
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("FEEDBACK_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Connect storage, then serve until shutdown.
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Feedback server v{}", env!("CARGO_PKG_VERSION"));

    let db = DatabasePool::connect(&config.database).await?;
    if config.database.run_migrations {
        feedback_database::migration::run_migrations(db.pool()).await?;
    }

    let store = Arc::new(MessageRepository::new(db.pool().clone()));
    let users = Arc::new(UserRepository::new(db.pool().clone()));

    let result = feedback_api::run_server(config, store, users).await;

    db.close().await;
    result
}
