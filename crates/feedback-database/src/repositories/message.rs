//! Chat message repository.

use async_trait::async_trait;
use sqlx::PgPool;

use feedback_core::error::{AppError, ErrorKind};
use feedback_core::result::AppResult;
use feedback_entity::message::PersistedMessage;

use super::MessageStore;

/// Repository for the append-only `messages` table.
#[derive(Debug, Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    /// Create a new message repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    async fn append(&self, message: &PersistedMessage) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO messages (channel_id, id, sender_id, sender_role, content, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&message.channel_id)
        .bind(message.id)
        .bind(&message.sender_id)
        .bind(&message.sender_role)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert message", e))?;

        Ok(())
    }
}
