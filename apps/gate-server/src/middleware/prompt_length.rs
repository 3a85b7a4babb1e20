//! Prompt length stage, plus the shared helper that reads the prompt out of
//! a chat request body without consuming it.

use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    web,
};
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;

use chatgate_shared::Envelope;
use chatgate_shared::dto::ChatProcessRequest;

use crate::middleware::error::AppError;
use crate::state::AppState;

/// Prompt parsed from the body, cached in request extensions.
#[derive(Debug, Clone)]
struct ChatPrompt(Option<String>);

/// Returns the `prompt` field of a chat request body.
///
/// The body is buffered and put back so the handler can still read it.
/// Unparsable bodies yield `None`.
pub async fn chat_prompt(req: &mut ServiceRequest) -> Result<Option<String>, Error> {
    let cached = req.extensions().get::<ChatPrompt>().cloned();
    if let Some(ChatPrompt(prompt)) = cached {
        return Ok(prompt);
    }

    let body = req.extract::<web::Bytes>().await?;
    let prompt = serde_json::from_slice::<ChatProcessRequest>(&body)
        .ok()
        .map(|request| request.prompt);

    req.set_payload(body.into());
    req.extensions_mut().insert(ChatPrompt(prompt.clone()));

    Ok(prompt)
}

/// Rejects prompts outside the configured character bounds.
pub struct PromptLengthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for PromptLengthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = PromptLengthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(PromptLengthService {
            service: Rc::new(service),
        }))
    }
}

pub struct PromptLengthService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for PromptLengthService<S>
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

        Box::pin(async move {
            let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
                tracing::error!("AppState not found in app data");
                return Err(AppError::Internal("Server configuration error".to_string()).into());
            };

            let (min, max) = (state.config.min_prompt_chars, state.config.max_prompt_chars);
            let tips = &state.config.chat_policy.friendly_tips;

            let prompt = chat_prompt(&mut req).await?.unwrap_or_default();
            if let Some(message) = length_violation(&prompt, min, max, tips) {
                tracing::info!(min = min, max = max, "Prompt length rejected");
                let response = HttpResponse::Ok().json(Envelope::<()>::fail(message));
                return Ok(req.into_response(response).map_into_right_body());
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

/// Rejection message for a prompt outside `[min, max]`; empty prompts pass.
fn length_violation(prompt: &str, min: usize, max: usize, tips: &str) -> Option<String> {
    if prompt.is_empty() {
        return None;
    }

    let len = prompt.chars().count();
    if len > max {
        Some(format!("输入的prompt长度超过了{max}个字符{tips}"))
    } else if len < min {
        Some(format!("输入的prompt长度小于了{min}个字符{tips}"))
    } else {
        None
    }
}
