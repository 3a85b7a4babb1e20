//! # Chatgate Shared
//!
//! Wire types shared by the gate server and its clients.

pub mod dto;
pub mod response;

pub use response::{Envelope, EnvelopeStatus};
