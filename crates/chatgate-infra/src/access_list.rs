//! Access list repository backed by the `limitIp` JSON document.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use chatgate_core::domain::{AccessList, BlacklistEntry, BlacklistPolicy, Escalation, Standing};
use chatgate_core::error::StoreError;
use chatgate_core::ports::AccessListRepository;

use crate::store::{DocumentLocation, JsonDocumentStore};

pub const ACCESS_LIST_DOCUMENT: &str = "limitIp";

/// Stores blacklist and whitelist in one non-partitioned document.
pub struct JsonAccessListRepository {
    store: Arc<JsonDocumentStore>,
    location: DocumentLocation,
}

impl JsonAccessListRepository {
    pub fn new(store: Arc<JsonDocumentStore>, dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            location: DocumentLocation::new(dir, ACCESS_LIST_DOCUMENT),
        }
    }

    /// Snapshot of the whole list.
    pub async fn snapshot(&self) -> Result<AccessList, StoreError> {
        let document = self.store.acquire::<AccessList>(&self.location).await?;
        Ok(document.read(Clone::clone).await)
    }

    /// Adds `address` to the whitelist and persists it.
    pub async fn whitelist(&self, address: &str) -> Result<(), StoreError> {
        let document = self.store.acquire::<AccessList>(&self.location).await?;
        document.update(|list| list.whitelist(address)).await;
        document.persist().await?;

        tracing::info!(address = %address, "Address whitelisted");
        Ok(())
    }

    /// Clears any penalty recorded for `address` and persists the change.
    pub async fn pardon(&self, address: &str) -> Result<Option<BlacklistEntry>, StoreError> {
        let document = self.store.acquire::<AccessList>(&self.location).await?;
        let removed = document.update(|list| list.pardon(address)).await;

        if removed.is_some() {
            document.persist().await?;
            tracing::info!(address = %address, "Address pardoned");
        }

        Ok(removed)
    }
}

#[async_trait]
impl AccessListRepository for JsonAccessListRepository {
    async fn standing(&self, address: &str, now: DateTime<Utc>) -> Result<Standing, StoreError> {
        let document = self.store.acquire::<AccessList>(&self.location).await?;
        Ok(document.read(|list| list.standing(address, now)).await)
    }

    async fn register_exhaustion(
        &self,
        address: &str,
        now: DateTime<Utc>,
        policy: &BlacklistPolicy,
    ) -> Result<Escalation, StoreError> {
        let document = self.store.acquire::<AccessList>(&self.location).await?;
        let escalation = document
            .update(|list| list.register_exhaustion(address, now, policy))
            .await;

        if escalation.changed {
            document.persist().await?;
            tracing::debug!(address = %address, "Blacklist entry persisted");
        }

        Ok(escalation)
    }
}
