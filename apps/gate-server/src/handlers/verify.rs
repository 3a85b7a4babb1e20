//! Secret key and access token verification endpoints.

use actix_web::{HttpResponse, web};

use chatgate_core::ports::AuthError;
use chatgate_shared::Envelope;
use chatgate_shared::dto::VerifyRequest;

use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// Checks a submitted secret against `AUTH_SECRET_KEY`.
///
/// POST /api/verify
pub async fn verify(
    state: web::Data<AppState>,
    body: web::Json<VerifyRequest>,
) -> AppResult<HttpResponse> {
    let token = body.token.trim();
    if token.is_empty() {
        return Err(AppError::BadRequest("Secret key is empty".to_string()));
    }

    if state.config.auth_secret_key.as_deref() != Some(token) {
        return Err(AppError::BadRequest(
            "密钥无效 | Secret key is invalid".to_string(),
        ));
    }

    Ok(HttpResponse::Ok().json(Envelope::<()>::success("Verify successfully", None)))
}

/// Checks that a submitted access token is a valid session token.
///
/// POST /api/verify-vipkey
pub async fn verify_vipkey(
    state: web::Data<AppState>,
    body: web::Json<VerifyRequest>,
) -> AppResult<HttpResponse> {
    let token = body.token.trim();
    if token.is_empty() {
        return Err(AppError::BadRequest("Token empty".to_string()));
    }

    let verified = match &state.verifier {
        Some(verifier) => verifier.verify(token),
        None => Err(AuthError::InvalidToken(
            "session verification disabled".to_string(),
        )),
    };

    if let Err(e) = verified {
        tracing::debug!(error = %e, "Access token rejected");
        return Err(AppError::BadRequest(
            "授权码无效 | Token is invalid".to_string(),
        ));
    }

    Ok(HttpResponse::Ok().json(Envelope::<()>::success("Verify successfully", None)))
}
