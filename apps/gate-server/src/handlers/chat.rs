//! Chat relay endpoint.

use std::sync::{Arc, Mutex};

use actix_web::{HttpRequest, HttpResponse, web};
use futures::{StreamExt, TryStreamExt, future, stream};

use chatgate_core::Clock;
use chatgate_core::domain::{ChatExchange, final_message};
use chatgate_core::ports::ChatLogRecorder;
use chatgate_shared::dto::ChatProcessRequest;

use crate::middleware::error::{AppError, AppResult};
use crate::middleware::identity::client_identity;
use crate::observability::{REQUEST_ID_HEADER, RequestId};
use crate::state::AppState;

/// Relays an admitted chat request to the completion service and streams the
/// reply back unchanged. Once the reply has been fully relayed, the exchange
/// is appended to the daily chat log.
///
/// POST /api/chat-process
pub async fn chat_process(
    req: HttpRequest,
    state: web::Data<AppState>,
    request_id: RequestId,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let upstream = state
        .config
        .upstream_url
        .as_deref()
        .ok_or(AppError::UpstreamNotConfigured)?;

    let request = serde_json::from_slice::<ChatProcessRequest>(&body).unwrap_or_default();
    let identity = client_identity(&req);

    let response = state
        .http
        .post(upstream)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .header(REQUEST_ID_HEADER, request_id.as_str())
        .body(body)
        .send()
        .await?
        .error_for_status()?;

    tracing::debug!(upstream = %upstream, status = %response.status(), "Relaying upstream reply");

    let transcript = Arc::new(Mutex::new(Vec::new()));
    let captured = transcript.clone();

    let relay = response
        .bytes_stream()
        .inspect_ok(move |chunk| {
            captured
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .extend_from_slice(chunk);
        })
        .inspect_err(|e| {
            tracing::warn!(error = %e, "Upstream stream interrupted");
        });

    // Runs once the upstream stream has ended; yields no bytes.
    let log_exchange = stream::once(async move {
        let reply = final_message(&transcript.lock().unwrap_or_else(|e| e.into_inner()));
        let parent_message_id = request
            .options
            .as_ref()
            .and_then(|options| options.get("parentMessageId"))
            .and_then(|id| id.as_str());

        let now = state.store.clock().now();
        let exchange = ChatExchange::new(&identity, request.prompt.as_str(), reply, now);
        if let Err(e) = state.chat_log.record(exchange, parent_message_id).await {
            tracing::error!(error = %e, "Failed to persist chat log");
        }
    })
    .filter_map(|()| future::ready(None));

    Ok(HttpResponse::Ok()
        .content_type("application/octet-stream")
        .streaming(relay.chain(log_exchange)))
}
