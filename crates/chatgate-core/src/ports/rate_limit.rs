//! Rate limiting port.

use async_trait::async_trait;
use std::time::Duration;

/// Fixed-window limiter for one granularity.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Takes one point from `key`'s budget in the active window.
    /// `allowed == false` means the budget was already exhausted.
    async fn consume(&self, key: &str) -> Result<RateLimitResult, RateLimitError>;
}

/// Result of a consume attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_after: Duration,
}

impl RateLimitResult {
    /// Result reported by a limiter with no budget configured.
    pub fn unlimited() -> Self {
        Self {
            allowed: true,
            remaining: u32::MAX,
            reset_after: Duration::ZERO,
        }
    }
}

/// Rate limit errors.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Backend error: {0}")]
    Backend(String),
}
