//! Usage recorder backed by the day-partitioned `statistics` document.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use chatgate_core::domain::{UsageSnapshot, UsageStatistics, Visit};
use chatgate_core::error::StoreError;
use chatgate_core::ports::UsageRecorder;

use crate::store::{DocumentLocation, JsonDocumentStore};

pub const USAGE_DOCUMENT: &str = "statistics";

pub struct JsonUsageRecorder {
    store: Arc<JsonDocumentStore>,
    location: DocumentLocation,
}

impl JsonUsageRecorder {
    pub fn new(store: Arc<JsonDocumentStore>, dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            location: DocumentLocation::day_partitioned(dir, USAGE_DOCUMENT),
        }
    }

    /// Today's statistics.
    pub async fn snapshot(&self) -> Result<UsageStatistics, StoreError> {
        let document = self.store.acquire::<UsageStatistics>(&self.location).await?;
        Ok(document.read(Clone::clone).await)
    }
}

#[async_trait]
impl UsageRecorder for JsonUsageRecorder {
    async fn record(&self, visit: &Visit) -> Result<UsageSnapshot, StoreError> {
        let document = self.store.acquire::<UsageStatistics>(&self.location).await?;
        let snapshot = document.update(|stats| stats.record(visit)).await;

        // The in-memory count already reflects the visit; a failed write is
        // retried by the next persist.
        if let Err(e) = document.persist().await {
            tracing::error!(address = %visit.address, error = %e, "Failed to persist usage statistics");
        }

        Ok(snapshot)
    }
}
