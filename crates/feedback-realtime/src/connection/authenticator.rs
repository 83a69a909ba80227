//! Pre-upgrade authorization: token verification plus a login-state lookup.

use std::sync::Arc;

use tracing::{debug, warn};

use feedback_auth::jwt::JwtDecoder;
use feedback_core::error::AppError;
use feedback_database::repositories::UserDirectory;

use super::handle::Identity;

/// Authenticates WebSocket upgrade requests.
///
/// Runs on the request path before any connection or hub state exists.
#[derive(Clone)]
pub struct WsAuthenticator {
    /// JWT decoder.
    decoder: Arc<JwtDecoder>,
    /// Login-state lookup.
    users: Arc<dyn UserDirectory>,
}

impl std::fmt::Debug for WsAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsAuthenticator").finish()
    }
}

impl WsAuthenticator {
    /// Creates a new WebSocket authenticator.
    pub fn new(decoder: Arc<JwtDecoder>, users: Arc<dyn UserDirectory>) -> Self {
        Self { decoder, users }
    }

    /// Resolves a query-string token into an identity.
    ///
    /// - missing or invalid token: authentication error (401)
    /// - user unknown to the directory, or the lookup failed: authentication
    ///   error (401)
    /// - user known but logged out: authorization error (403)
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Identity, AppError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::authentication("Missing token"))?;

        let claims = self.decoder.decode(token)?;

        let logged_in = match self.users.logged_in(&claims.user_id).await {
            Ok(state) => state,
            Err(e) => {
                warn!(user_id = %claims.user_id, error = %e, "Upgrade rejected: user lookup failed");
                return Err(AppError::authentication("User not found"));
            }
        };

        match logged_in {
            None => {
                debug!(user_id = %claims.user_id, "Upgrade rejected: user not found");
                Err(AppError::authentication("User not found"))
            }
            Some(false) => {
                debug!(user_id = %claims.user_id, "Upgrade rejected: user not logged in");
                Err(AppError::authorization("User is not logged in"))
            }
            Some(true) => Ok(Identity {
                user_id: claims.user_id,
                role: claims.role,
            }),
        }
    }
}
