//! Error handling - every failure is rendered in the `{ status, message, data }` envelope.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chatgate_core::ports::AuthError;
use chatgate_shared::Envelope;

/// Application-level error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Upstream is not configured")]
    UpstreamNotConfigured,

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            // Client-visible failures travel in the envelope with a 200, which
            // is what the chat front end expects.
            AppError::BadRequest(_) | AppError::Unauthorized(_) => StatusCode::OK,
            AppError::UpstreamNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let envelope: Envelope = match self {
            AppError::Unauthorized(message) => Envelope::unauthorized(message.clone()),
            AppError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal error");
                Envelope::fail("Internal server error")
            }
            AppError::Upstream(detail) => {
                tracing::error!(detail = %detail, "Upstream request failed");
                Envelope::fail(self.to_string())
            }
            other => Envelope::fail(other.to_string()),
        };

        HttpResponse::build(self.status_code()).json(envelope)
    }
}

/// Message shown when the session token is missing or invalid.
pub const SESSION_FAILED_MESSAGE: &str = "鉴权失败，请刷新重试或联系管理员 | Authentication failed, please refresh and try again or contact the administrator";

/// Message shown when the bearer secret does not match.
pub const NO_ACCESS_MESSAGE: &str = "Error: 无访问权限 | No access rights";

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::SecretMismatch => AppError::Unauthorized(NO_ACCESS_MESSAGE.to_string()),
            AuthError::TokenExpired | AuthError::InvalidToken(_) | AuthError::MissingToken => {
                AppError::Unauthorized(SESSION_FAILED_MESSAGE.to_string())
            }
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Upstream(err.to_string())
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;
