//! Usage statistics port.

use async_trait::async_trait;

use crate::domain::{UsageSnapshot, Visit};
use crate::error::StoreError;

/// Durable per-day usage recorder.
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    /// Appends `visit` to today's statistics and returns the updated counts.
    async fn record(&self, visit: &Visit) -> Result<UsageSnapshot, StoreError>;
}
