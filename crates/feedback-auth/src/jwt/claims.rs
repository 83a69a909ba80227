//! Claims carried by tokens from the auth service.

use serde::{Deserialize, Serialize};

use feedback_entity::user::Role;

/// Structured token payload.
///
/// Decoding fails (and the token is rejected) if `user_id`, `role` or `exp`
/// is missing or mistyped, or if `role` is not a known role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Opaque user identity.
    pub user_id: String,
    /// Role at the time of issuance.
    pub role: Role,
    /// Email address, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Issued-at timestamp (seconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}
