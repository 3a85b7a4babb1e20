//! In-memory fixed-window rate limiter keyed by client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use chatgate_core::admission::WindowLimiters;
use chatgate_core::domain::{Window, WindowBudgets};
use chatgate_core::ports::{RateLimitError, RateLimitResult, RateLimiter};

/// In-memory rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Points per window; 0 disables the limiter.
    pub max_requests: u32,
    /// Window duration.
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn for_window(window: Window, max_requests: u32) -> Self {
        Self {
            max_requests,
            window: window.duration(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    consumed: u32,
    started: Instant,
}

/// Fixed-window counter per key.
///
/// A key's window opens on its first consume and lasts `config.window`;
/// the counter resets on the first consume after it closes.
/// Note: counters are per-process and start empty on restart.
pub struct InMemoryRateLimiter {
    counters: DashMap<String, WindowCounter>,
    config: RateLimitConfig,
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            counters: DashMap::new(),
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.max_requests > 0
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Drops counters whose window has closed.
    pub fn purge_expired(&self) -> usize {
        let before = self.counters.len();
        let window = self.config.window;
        self.counters
            .retain(|_, counter| counter.started.elapsed() < window);
        before - self.counters.len()
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn consume(&self, key: &str) -> Result<RateLimitResult, RateLimitError> {
        if !self.is_enabled() {
            return Ok(RateLimitResult::unlimited());
        }

        let now = Instant::now();
        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert(WindowCounter {
                consumed: 0,
                started: now,
            });
        let counter = entry.value_mut();

        if now.duration_since(counter.started) >= self.config.window {
            counter.consumed = 0;
            counter.started = now;
        }

        let reset_after = self
            .config
            .window
            .saturating_sub(now.duration_since(counter.started));

        if counter.consumed < self.config.max_requests {
            counter.consumed += 1;
            Ok(RateLimitResult {
                allowed: true,
                remaining: self.config.max_requests - counter.consumed,
                reset_after,
            })
        } else {
            Ok(RateLimitResult {
                allowed: false,
                remaining: 0,
                reset_after,
            })
        }
    }
}

/// The minute, hour and day limiters of one admission profile.
#[derive(Clone)]
pub struct InMemoryWindowLimiters {
    pub minute: Arc<InMemoryRateLimiter>,
    pub hour: Arc<InMemoryRateLimiter>,
    pub day: Arc<InMemoryRateLimiter>,
}

impl InMemoryWindowLimiters {
    pub fn new(budgets: WindowBudgets) -> Self {
        let build = |window: Window| {
            Arc::new(InMemoryRateLimiter::new(RateLimitConfig::for_window(
                window,
                budgets.get(window),
            )))
        };

        Self {
            minute: build(Window::Minute),
            hour: build(Window::Hour),
            day: build(Window::Day),
        }
    }

    /// Port handles for the admission pipeline.
    pub fn limiters(&self) -> WindowLimiters {
        WindowLimiters {
            day: self.day.clone(),
            hour: self.hour.clone(),
            minute: self.minute.clone(),
        }
    }

    /// Purges every window; returns the number of counters dropped.
    pub fn purge_expired(&self) -> usize {
        self.minute.purge_expired() + self.hour.purge_expired() + self.day.purge_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, secs: u64) -> InMemoryRateLimiter {
        InMemoryRateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(secs),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_allows_budget_then_rejects() {
        let limiter = limiter(3, 60);

        for expected_remaining in [2, 1, 0] {
            let result = limiter.consume("1.2.3.4").await.unwrap();
            assert!(result.allowed);
            assert_eq!(result.remaining, expected_remaining);
        }

        let result = limiter.consume("1.2.3.4").await.unwrap();
        assert!(!result.allowed);
        assert_eq!(result.remaining, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let limiter = limiter(1, 60);

        assert!(limiter.consume("a").await.unwrap().allowed);
        assert!(!limiter.consume("a").await.unwrap().allowed);
        assert!(limiter.consume("b").await.unwrap().allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_duration() {
        let limiter = limiter(2, 60);

        limiter.consume("k").await.unwrap();
        limiter.consume("k").await.unwrap();
        assert!(!limiter.consume("k").await.unwrap().allowed);

        tokio::time::advance(Duration::from_secs(59)).await;
        let blocked = limiter.consume("k").await.unwrap();
        assert!(!blocked.allowed);
        assert_eq!(blocked.reset_after, Duration::from_secs(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.consume("k").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_zero_budget_is_unlimited() {
        let limiter = limiter(0, 60);
        assert!(!limiter.is_enabled());

        for _ in 0..1_000 {
            assert!(limiter.consume("k").await.unwrap().allowed);
        }
        assert!(limiter.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_drops_closed_windows() {
        let limiter = limiter(5, 60);

        limiter.consume("old").await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.consume("new").await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(limiter.purge_expired(), 1);
        assert_eq!(limiter.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_limiters_follow_budgets() {
        let limiters = InMemoryWindowLimiters::new(WindowBudgets::new(2, 0, 5));

        assert!(limiters.minute.is_enabled());
        assert!(!limiters.hour.is_enabled());
        assert_eq!(limiters.day.config().window, Duration::from_secs(86_400));

        let ports = limiters.limiters();
        assert!(ports.get(Window::Minute).consume("k").await.unwrap().allowed);
        assert_eq!(limiters.minute.len(), 1);
    }
}
