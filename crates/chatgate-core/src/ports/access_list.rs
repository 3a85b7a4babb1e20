//! Access list (blacklist / whitelist) repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{BlacklistPolicy, Escalation, Standing};
use crate::error::StoreError;

/// Persistent blacklist and whitelist.
#[async_trait]
pub trait AccessListRepository: Send + Sync {
    /// Current standing of `address`.
    async fn standing(&self, address: &str, now: DateTime<Utc>) -> Result<Standing, StoreError>;

    /// Records a daily-window exhaustion and persists it before returning.
    ///
    /// A write failure is returned as an error; the in-memory mutation stays
    /// applied and is picked up by the next successful write.
    async fn register_exhaustion(
        &self,
        address: &str,
        now: DateTime<Utc>,
        policy: &BlacklistPolicy,
    ) -> Result<Escalation, StoreError>;
}
