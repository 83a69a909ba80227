//! JWT token validation.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use feedback_core::config::AuthConfig;
use feedback_core::error::AppError;

use super::claims::Claims;

/// Validates HS256 tokens signed with the shared secret.
#[derive(Clone)]
pub struct JwtDecoder {
    /// HMAC secret key for verification.
    decoding_key: DecodingKey,
    /// Validation configuration.
    validation: Validation,
}

impl std::fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtDecoder {
    /// Creates a new decoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = config.leeway_seconds;

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Decodes and validates a token string.
    ///
    /// Checks signature and expiration, then decodes the payload into
    /// [`Claims`]. Every failure is an authentication error.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::authentication("Token has expired")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidToken => {
                        AppError::authentication("Invalid token format")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AppError::authentication("Invalid token signature")
                    }
                    jsonwebtoken::errors::ErrorKind::Json(_) => {
                        AppError::authentication("Malformed token claims")
                    }
                    _ => AppError::authentication(format!("Token validation failed: {e}")),
                }
            })?;

        tracing::trace!(user_id = %token_data.claims.user_id, "Token verified");
        Ok(token_data.claims)
    }
}
