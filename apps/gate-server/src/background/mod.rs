//! Background maintenance.

#[cfg(feature = "scheduler")]
mod scheduler;

#[cfg(feature = "scheduler")]
pub use scheduler::{Scheduler, SchedulerConfig};
