//! Persisted chat message row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::Role;

/// A chat message as written to the `messages` table.
///
/// Rows are append-only and ordered by `(channel_id, created_at)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PersistedMessage {
    /// Channel the message was sent on.
    pub channel_id: String,
    /// Time-ordered unique id (UUIDv7).
    pub id: Uuid,
    /// Authenticated sender.
    pub sender_id: String,
    /// Sender role at the time of sending, stored as its lowercase name.
    pub sender_role: String,
    /// Message body.
    pub content: String,
    /// Server-side creation time.
    pub created_at: DateTime<Utc>,
}

impl PersistedMessage {
    /// Build a new row stamped with the current time and a fresh v7 id.
    pub fn new(
        channel_id: impl Into<String>,
        sender_id: impl Into<String>,
        sender_role: Role,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            id: Uuid::now_v7(),
            sender_id: sender_id.into(),
            sender_role: sender_role.as_str().to_string(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}
