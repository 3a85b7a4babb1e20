//! Request admission - the ordered abuse-mitigation stages.

mod message;
mod pipeline;
mod policy;

pub use message::{BlacklistKind, RejectReason, Rejection};
pub use pipeline::{AdmissionPipeline, Decision, WindowLimiters};
pub use policy::{AdmissionPolicy, SessionScope};
