//! Admission middleware - runs the access list and window limits before the handler.

use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    web,
};
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;

use chatgate_core::Decision;
use chatgate_shared::Envelope;

use crate::middleware::error::AppError;
use crate::middleware::identity::client_identity;
use crate::middleware::prompt_length::chat_prompt;
use crate::state::AppState;

/// Which admission pipeline guards a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionProfile {
    /// Configured budgets, per-device minute window, usage statistics.
    Chat,
    /// Fixed generous budgets for auxiliary endpoints.
    Common,
}

/// Admission middleware factory.
pub struct AdmissionMiddleware {
    profile: AdmissionProfile,
}

impl AdmissionMiddleware {
    pub fn chat() -> Self {
        Self {
            profile: AdmissionProfile::Chat,
        }
    }

    pub fn common() -> Self {
        Self {
            profile: AdmissionProfile::Common,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdmissionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AdmissionMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdmissionMiddlewareService {
            service: Rc::new(service),
            profile: self.profile,
        }))
    }
}

pub struct AdmissionMiddlewareService<S> {
    service: Rc<S>,
    profile: AdmissionProfile,
}

impl<S, B> Service<ServiceRequest> for AdmissionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let profile = self.profile;

        Box::pin(async move {
            let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
                tracing::error!("AppState not found in app data");
                return Err(AppError::Internal("Server configuration error".to_string()).into());
            };

            let (pipeline, prompt) = match profile {
                AdmissionProfile::Chat => (&state.chat, chat_prompt(&mut req).await?),
                AdmissionProfile::Common => (&state.common, None),
            };

            let identity = client_identity(req.request());

            match pipeline.evaluate(&identity, prompt.as_deref()).await {
                Decision::Admit => {
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Decision::Reject(rejection) => {
                    tracing::info!(
                        address = %identity.address_key(),
                        profile = ?profile,
                        reason = ?rejection.reason,
                        "Request rejected"
                    );

                    let response = HttpResponse::Ok().json(Envelope::<()>::fail(rejection.message));
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}
