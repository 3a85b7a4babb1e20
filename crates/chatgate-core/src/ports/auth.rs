//! Session credential verification port.

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: String,
    pub name: String,
    pub exp: i64,
}

/// Verifies session tokens issued elsewhere.
pub trait SessionVerifier: Send + Sync {
    /// Validate and decode a token.
    fn verify(&self, token: &str) -> Result<SessionClaims, AuthError>;
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Missing session token")]
    MissingToken,

    #[error("No access rights")]
    SecretMismatch,
}
