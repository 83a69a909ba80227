//! User role enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Roles carried in the bearer token's `role` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Operator allowed to open and close the staff chat.
    Admin,
    /// Operator whose chat messages are gated by the admin.
    Staff,
    /// End user.
    User,
}

impl Role {
    /// Check if this role is an admin.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Check if this role is staff.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Staff)
    }

    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
