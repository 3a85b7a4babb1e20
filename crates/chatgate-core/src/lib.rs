//! # Chatgate Core
//!
//! The domain layer of the chat relay's abuse-mitigation subsystem.
//! Access-list rules, window budgets, usage statistics and the admission
//! pipeline live here; storage and limiter backends are behind the ports.

pub mod admission;
pub mod clock;
pub mod domain;
pub mod error;
pub mod ports;

pub use admission::{AdmissionPipeline, Decision};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::StoreError;
