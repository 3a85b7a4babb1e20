//! Application state - shared across all handlers and middleware.

use std::sync::Arc;

use chatgate_core::clock::Clock;
use chatgate_core::ports::SessionVerifier;
use chatgate_core::{AdmissionPipeline, SystemClock};
use chatgate_infra::{
    InMemoryWindowLimiters, JsonAccessListRepository, JsonChatLogRecorder, JsonDocumentStore,
    JsonUsageRecorder,
};

use crate::config::AppConfig;

/// Directory (under the data root) holding the access list.
const ACCESS_LIST_DIR: &str = "limit";
/// Directory (under the data root) holding daily statistics.
const USAGE_DIR: &str = "statistics";
/// Directory (under the data root) holding daily chat logs.
const CHAT_LOG_DIR: &str = "chat";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<JsonDocumentStore>,
    pub access_list: Arc<JsonAccessListRepository>,
    pub usage: Arc<JsonUsageRecorder>,
    pub chat_log: Arc<JsonChatLogRecorder>,
    /// Pipeline guarding `/chat-process`.
    pub chat: Arc<AdmissionPipeline>,
    /// Pipeline guarding auxiliary endpoints.
    pub common: Arc<AdmissionPipeline>,
    pub chat_limiters: InMemoryWindowLimiters,
    pub common_limiters: InMemoryWindowLimiters,
    pub verifier: Option<Arc<dyn SessionVerifier>>,
    pub http: reqwest::Client,
}

impl AppState {
    /// Build the application state on the system clock.
    pub fn new(config: AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build the application state with an explicit clock.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(JsonDocumentStore::new(&config.data_dir, clock.clone()));
        let access_list = Arc::new(JsonAccessListRepository::new(
            store.clone(),
            ACCESS_LIST_DIR,
        ));
        let usage = Arc::new(JsonUsageRecorder::new(store.clone(), USAGE_DIR));
        let chat_log = Arc::new(JsonChatLogRecorder::new(store.clone(), CHAT_LOG_DIR));

        let chat_limiters = InMemoryWindowLimiters::new(config.chat_policy.budgets);
        let common_limiters = InMemoryWindowLimiters::new(config.common_policy.budgets);

        let chat = AdmissionPipeline::new(
            config.chat_policy.clone(),
            chat_limiters.limiters(),
            access_list.clone(),
            clock.clone(),
        )
        .with_usage(usage.clone());

        let common = AdmissionPipeline::new(
            config.common_policy.clone(),
            common_limiters.limiters(),
            access_list.clone(),
            clock,
        );

        let verifier = session_verifier();

        tracing::info!(
            data_dir = %config.data_dir.display(),
            minute = config.chat_policy.budgets.minute,
            hour = config.chat_policy.budgets.hour,
            day = config.chat_policy.budgets.day,
            session_auth = verifier.is_some(),
            "Application state initialized"
        );

        Self {
            config: Arc::new(config),
            store,
            access_list,
            usage,
            chat_log,
            chat: Arc::new(chat),
            common: Arc::new(common),
            chat_limiters,
            common_limiters,
            verifier,
            http: reqwest::Client::new(),
        }
    }

    /// Replaces the session verifier.
    #[cfg(test)]
    pub fn with_verifier(mut self, verifier: Option<Arc<dyn SessionVerifier>>) -> Self {
        self.verifier = verifier;
        self
    }
}

#[cfg(feature = "auth")]
fn session_verifier() -> Option<Arc<dyn SessionVerifier>> {
    Some(Arc::new(chatgate_infra::JwtSessionVerifier::from_env()))
}

#[cfg(not(feature = "auth"))]
fn session_verifier() -> Option<Arc<dyn SessionVerifier>> {
    tracing::info!("Running without auth feature - session tokens are not verified");
    None
}
