//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod access_list;
mod auth;
mod chat_log;
mod rate_limit;
mod usage;

pub use access_list::AccessListRepository;
pub use auth::{AuthError, SessionClaims, SessionVerifier};
pub use chat_log::ChatLogRecorder;
pub use rate_limit::{RateLimitError, RateLimitResult, RateLimiter};
pub use usage::UsageRecorder;
