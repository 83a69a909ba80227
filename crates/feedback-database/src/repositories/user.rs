//! Lookup against the auth service's user table.

use async_trait::async_trait;
use sqlx::PgPool;

use feedback_core::error::{AppError, ErrorKind};
use feedback_core::result::AppResult;

use super::UserDirectory;

/// Reads login state from `auth.users`, which is owned by the auth service.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn logged_in(&self, user_id: &str) -> AppResult<Option<bool>> {
        sqlx::query_scalar::<_, bool>("SELECT isloggedin FROM auth.users WHERE id::text = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to look up user login state", e)
            })
    }
}
