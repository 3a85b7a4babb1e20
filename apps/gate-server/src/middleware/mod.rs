//! Middleware modules.
//!
//! `/chat-process` runs session auth, then admission, then the prompt length
//! check; `/verify` runs admission on the common profile only.

pub mod admission;
pub mod auth;
pub mod error;
pub mod identity;
pub mod prompt_length;
