//! Repository traits consumed by the hub and their PostgreSQL implementations.

pub mod message;
pub mod user;

use async_trait::async_trait;

use feedback_core::result::AppResult;
use feedback_entity::message::PersistedMessage;

pub use message::MessageRepository;
pub use user::UserRepository;

/// Durable, append-only chat message store.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Append a single message.
    async fn append(&self, message: &PersistedMessage) -> AppResult<()>;
}

/// Read-only view of the auth service's user table.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Returns the user's logged-in flag, or `None` if no such user exists.
    async fn logged_in(&self, user_id: &str) -> AppResult<Option<bool>>;
}
