//! Rate limiting implementations.

mod memory;

pub use memory::{InMemoryRateLimiter, InMemoryWindowLimiters, RateLimitConfig};
