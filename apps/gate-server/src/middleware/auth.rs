//! Session authentication middleware.
//!
//! A request passes when its session cookie carries a valid token and, if
//! `AUTH_SECRET_KEY` is configured, its `Authorization: Bearer` value matches
//! that key.

use actix_web::{
    Error, HttpMessage, HttpRequest, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header,
    web,
};
use std::future::{Future, Ready, ready};
use std::pin::Pin;

use chatgate_core::ports::{AuthError, SessionClaims, SessionVerifier};

use crate::middleware::error::AppError;
use crate::middleware::identity::session_token;
use crate::state::AppState;

/// Checks the session token and, when set, the bearer secret.
pub fn authenticate(
    req: &HttpRequest,
    verifier: Option<&dyn SessionVerifier>,
    secret: Option<&str>,
) -> Result<Option<SessionClaims>, AuthError> {
    let claims = match verifier {
        Some(verifier) => {
            let token = session_token(req).ok_or(AuthError::MissingToken)?;
            Some(verifier.verify(&token)?)
        }
        None => None,
    };

    if let Some(secret) = secret {
        let presented = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.replacen("Bearer ", "", 1).trim().to_string());

        if presented.as_deref() != Some(secret) {
            return Err(AuthError::SecretMismatch);
        }
    }

    Ok(claims)
}

/// Session authentication middleware factory.
pub struct SessionAuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for SessionAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = SessionAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionAuthService { service }))
    }
}

pub struct SessionAuthService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for SessionAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
            tracing::error!("AppState not found in app data");
            return Box::pin(async {
                Err(AppError::Internal("Server configuration error".to_string()).into())
            });
        };

        let outcome = authenticate(
            req.request(),
            state.verifier.as_deref(),
            state.config.auth_secret_key.as_deref(),
        );

        match outcome {
            Ok(claims) => {
                if let Some(claims) = claims {
                    req.extensions_mut().insert(claims);
                }

                let fut = self.service.call(req);
                Box::pin(async move {
                    let res = fut.await?;
                    Ok(res.map_into_left_body())
                })
            }
            Err(e) => {
                tracing::info!(error = %e, path = %req.path(), "Session authentication failed");

                let response = AppError::from(e).error_response();
                Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) })
            }
        }
    }
}
