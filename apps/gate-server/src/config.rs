//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use chatgate_core::admission::{AdmissionPolicy, SessionScope};
use chatgate_core::domain::{BlacklistPolicy, WindowBudgets};
use chrono::TimeDelta;

/// Appended to rejections when `FRYENDLY_TIPS` is not set.
pub const DEFAULT_FRIENDLY_TIPS: &str = "\n\n[温馨提示]\n为了让更多人连接到AI的世界，建议提升问题质量并理性提问。 \n服务器小，请轻点使用~\n";

const DEFAULT_PENALTY_MS: i64 = 24 * 60 * 60 * 1000;
const DEFAULT_MAX_CHARACTER_SIZE: usize = 999_999_999;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Root of the document store.
    pub data_dir: PathBuf,
    /// Policy for `/chat-process`.
    pub chat_policy: AdmissionPolicy,
    /// Policy for auxiliary endpoints such as `/verify`.
    pub common_policy: AdmissionPolicy,
    pub min_prompt_chars: usize,
    pub max_prompt_chars: usize,
    /// Bearer secret; unset or blank disables the check.
    pub auth_secret_key: Option<String>,
    /// Completion endpoint that admitted chat requests are relayed to.
    pub upstream_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let chat_policy = chat_policy_from_env();

        let common_policy = common_policy(&chat_policy, non_empty_var("FRYENDLY_TIPS"));

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3002),
            data_dir: env::var("DATA_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map_or_else(|| PathBuf::from(".db"), PathBuf::from),
            chat_policy,
            common_policy,
            min_prompt_chars: parse_var("MIN_CHARACTER_SIZE").unwrap_or(0),
            max_prompt_chars: parse_var("MAX_CHARACTER_SIZE").unwrap_or(DEFAULT_MAX_CHARACTER_SIZE),
            auth_secret_key: non_empty_var("AUTH_SECRET_KEY").map(|s| s.trim().to_string()),
            upstream_url: non_empty_var("UPSTREAM_URL"),
        }
    }
}

fn chat_policy_from_env() -> AdmissionPolicy {
    let budgets = WindowBudgets::from_signed(
        parse_var("MAX_REQUEST_PER_MINUTE").unwrap_or(0),
        parse_var("MAX_REQUEST_PER_HOUR").unwrap_or(0),
        parse_var("MAX_REQUEST_PER_DAY").unwrap_or(0),
    );

    let penalty_ms = parse_var::<i64>("MAX_BLACKLIST_TIME")
        .filter(|ms| *ms >= 0)
        .unwrap_or(DEFAULT_PENALTY_MS);

    let escalation_threshold = parse_var::<i64>("MAX_BLACKLIST_LIMITER_COUNT")
        .map(|n| u32::try_from(n.max(0)).unwrap_or(u32::MAX))
        .unwrap_or(3);

    AdmissionPolicy {
        budgets,
        blacklist: BlacklistPolicy {
            penalty: TimeDelta::milliseconds(penalty_ms),
            escalation_threshold,
        },
        friendly_tips: non_empty_var("FRYENDLY_TIPS")
            .unwrap_or_else(|| DEFAULT_FRIENDLY_TIPS.to_string()),
        first_request_tip: non_empty_var("FIRST_REQUEST_TIPS").unwrap_or_default(),
        session_scope: SessionScope::AddressAndAgent,
    }
}

/// The auxiliary profile shares the chat blacklist rules. Its tip has no
/// built-in default.
fn common_policy(chat: &AdmissionPolicy, tips: Option<String>) -> AdmissionPolicy {
    AdmissionPolicy {
        blacklist: chat.blacklist,
        friendly_tips: tips.unwrap_or_default(),
        ..AdmissionPolicy::common()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Parses `key`; decimal values are truncated to their integer part.
fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = non_empty_var(key)?;
    let trimmed = raw.trim();
    trimmed
        .parse()
        .ok()
        .or_else(|| trimmed.split('.').next().and_then(|int| int.parse().ok()))
}
