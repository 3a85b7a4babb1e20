//! # Chatgate Infrastructure
//!
//! Concrete implementations of the ports defined in `chatgate-core`:
//! the JSON document store, the repositories and recorders built on it, in-memory
//! window limiters and session token verification.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - Storage and limiters only
//! - `auth` - JWT session verification

pub mod access_list;
pub mod chat_log;
pub mod rate_limit;
pub mod store;
pub mod usage;

#[cfg(feature = "auth")]
pub mod auth;

pub use access_list::JsonAccessListRepository;
pub use chat_log::JsonChatLogRecorder;
pub use rate_limit::{InMemoryRateLimiter, InMemoryWindowLimiters, RateLimitConfig};
pub use store::{Document, DocumentLocation, JsonDocumentStore};
pub use usage::JsonUsageRecorder;

#[cfg(feature = "auth")]
pub use auth::{JwtConfig, JwtSessionVerifier};
