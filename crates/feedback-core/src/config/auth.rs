//! Token verification configuration.

use serde::{Deserialize, Serialize};

/// Settings for verifying bearer tokens issued by the auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared HMAC-SHA256 signing secret.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Clock skew tolerance applied to `exp`, in seconds.
    #[serde(default = "default_leeway")]
    pub leeway_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            leeway_seconds: default_leeway(),
        }
    }
}

fn default_jwt_secret() -> String {
    "CHANGE_ME_IN_PRODUCTION".to_string()
}

fn default_leeway() -> u64 {
    5
}
