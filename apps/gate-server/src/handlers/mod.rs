//! HTTP handlers and route configuration.

mod chat;
mod health;
mod verify;

use actix_web::web;

use crate::middleware::admission::AdmissionMiddleware;
use crate::middleware::auth::SessionAuthMiddleware;
use crate::middleware::prompt_length::PromptLengthMiddleware;

/// Configure all application routes, mounted under both `/api` and `/`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api").configure(gate_routes))
        .configure(gate_routes);
}

fn gate_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check))
        .route("/verify", web::post().to(verify::verify))
        .service(
            web::resource("/verify-vipkey")
                .wrap(AdmissionMiddleware::common())
                .route(web::post().to(verify::verify_vipkey)),
        )
        .service(
            // Wrapped last runs first: auth, admission, prompt length.
            web::resource("/chat-process")
                .wrap(PromptLengthMiddleware)
                .wrap(AdmissionMiddleware::chat())
                .wrap(SessionAuthMiddleware)
                .route(web::post().to(chat::chat_process)),
        );
}
