//! JWT session verifier implementation.

use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use chatgate_core::ports::{AuthError, SessionClaims, SessionVerifier};

/// JWT verifier configuration.
#[derive(Debug, Clone, Default)]
pub struct JwtConfig {
    pub secret: String,
}

impl JwtConfig {
    /// Reads `JWT_SECRET`, falling back to `AUTH_SECRET_KEY`.
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| std::env::var("AUTH_SECRET_KEY").ok())
            .unwrap_or_default()
            .trim()
            .to_string();

        if secret.is_empty() {
            let is_production = std::env::var("RUST_ENV")
                .map(|v| v == "production" || v == "prod")
                .unwrap_or(false);

            if is_production {
                tracing::error!(
                    "SECURITY: No session secret configured in production! Set JWT_SECRET."
                );
            } else {
                tracing::warn!("No session secret configured. Set JWT_SECRET for production use.");
            }
        }

        Self { secret }
    }
}

/// Session claims as issued by the login service.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    user_id: String,
    #[serde(default)]
    name: String,
    exp: i64,
}

/// Verifies HS256 session tokens.
///
/// Without a configured secret every token is rejected.
pub struct JwtSessionVerifier {
    decoding_key: Option<DecodingKey>,
}

impl JwtSessionVerifier {
    pub fn new(config: JwtConfig) -> Self {
        let decoding_key = (!config.secret.is_empty())
            .then(|| DecodingKey::from_secret(config.secret.as_bytes()));
        Self { decoding_key }
    }

    pub fn from_env() -> Self {
        Self::new(JwtConfig::from_env())
    }
}

impl SessionVerifier for JwtSessionVerifier {
    fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let Some(decoding_key) = &self.decoding_key else {
            return Err(AuthError::InvalidToken(
                "no session secret configured".to_string(),
            ));
        };

        let token_data = decode::<Claims>(token, decoding_key, &Validation::default())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        Ok(SessionClaims {
            user_id: token_data.claims.user_id,
            name: token_data.claims.name,
            exp: token_data.claims.exp,
        })
    }
}
