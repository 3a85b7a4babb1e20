//! # Chatgate Server
//!
//! Actix-web front door for the chat relay: session auth, admission
//! (access list, window limits, usage statistics) and prompt checks in front
//! of the upstream completion service.

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

mod background;
mod config;
mod handlers;
mod middleware;
mod observability;
mod state;
mod telemetry;

use config::AppConfig;
use observability::RequestIdMiddleware;
use state::AppState;
use telemetry::TelemetryConfig;

/// Upper bound on buffered request bodies.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env();
    let (host, port) = (config.host.clone(), config.port);

    tracing::info!("Starting Chatgate on {}:{}", host, port);

    let state = AppState::new(config);

    #[cfg(feature = "scheduler")]
    let scheduler = start_scheduler(&state).await;

    let served = HttpServer::new(move || {
        App::new()
            .wrap(RequestIdMiddleware)
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
            .app_data(web::JsonConfig::default().limit(MAX_BODY_BYTES))
            .configure(handlers::configure_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await;

    #[cfg(feature = "scheduler")]
    if let Some(mut scheduler) = scheduler {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!(error = %e, "Scheduler did not stop cleanly");
        }
    }

    served
}

#[cfg(feature = "scheduler")]
async fn start_scheduler(state: &AppState) -> Option<background::Scheduler> {
    use background::{Scheduler, SchedulerConfig};

    let result = async {
        let scheduler = Scheduler::new(SchedulerConfig::from_env()).await?;
        scheduler
            .add_limiter_purge(vec![
                ("chat", state.chat_limiters.clone()),
                ("common", state.common_limiters.clone()),
            ])
            .await?;
        scheduler.start().await?;
        Ok::<_, tokio_cron_scheduler::JobSchedulerError>(scheduler)
    }
    .await;

    match result {
        Ok(scheduler) => Some(scheduler),
        Err(e) => {
            tracing::error!(error = %e, "Failed to start maintenance scheduler");
            None
        }
    }
}
