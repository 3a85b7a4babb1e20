//! JSON document store with per-location caching and daily rotation.

use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use chatgate_core::clock::{Clock, day_id};
use chatgate_core::error::StoreError;

use super::document::Document;
use super::location::DocumentLocation;

struct CachedDocument {
    partition: String,
    day_partitioned: bool,
    handle: Arc<dyn Any + Send + Sync>,
}

/// Loads, caches and rotates [`Document`]s under one root directory.
///
/// At most one document is cached per location. A day-partitioned document
/// whose partition is no longer today is dropped on the next `acquire` of any
/// location, and the current day's file is loaded in its place.
pub struct JsonDocumentStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    cache: Mutex<HashMap<String, CachedDocument>>,
}

impl JsonDocumentStore {
    pub fn new(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            clock,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the cached document for `location`, loading it on first use or
    /// after its day partition has expired.
    ///
    /// The cache lock is held across the load so concurrent callers share one
    /// read of the file.
    pub async fn acquire<T>(&self, location: &DocumentLocation) -> Result<Arc<Document<T>>, StoreError>
    where
        T: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
    {
        let now = self.clock.now();
        let today = location.partition_key(now);
        let current_day = day_id(now);
        let key = location.cache_key();

        let mut cache = self.cache.lock().await;

        cache.retain(|cached_key, cached| {
            let keep = !cached.day_partitioned || cached.partition == current_day;
            if !keep {
                tracing::info!(document = %cached_key, partition = %cached.partition, "Evicting expired partition");
            }
            keep
        });

        if let Some(cached) = cache.get(&key).filter(|cached| cached.partition == today) {
            return cached
                .handle
                .clone()
                .downcast::<Document<T>>()
                .map_err(|_| StoreError::TypeMismatch(key.clone()));
        }

        let path = self
            .root
            .join(location.dir())
            .join(location.file_name(&today));

        tracing::debug!(document = %path.display(), partition = %today, "Loading document");
        let document = Arc::new(Document::<T>::open(path, today.clone(), self.clock.clone()).await);

        cache.insert(
            key,
            CachedDocument {
                partition: today,
                day_partitioned: location.is_day_partitioned(),
                handle: document.clone(),
            },
        );

        Ok(document)
    }

    /// Persists the cached document for `location`, loading it first if needed.
    pub async fn persist<T>(&self, location: &DocumentLocation) -> Result<(), StoreError>
    where
        T: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
    {
        self.acquire::<T>(location).await?.persist().await
    }

    /// Number of cached documents.
    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// Partition currently cached for `location`, if any.
    pub async fn cached_partition(&self, location: &DocumentLocation) -> Option<String> {
        self.cache
            .lock()
            .await
            .get(&location.cache_key())
            .map(|cached| cached.partition.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chatgate_core::ManualClock;
    use chrono::{Local, TimeDelta, TimeZone, Utc};
    use tempfile::TempDir;

    type Counters = BTreeMap<String, u64>;

    fn midsummer() -> chrono::DateTime<Utc> {
        Local
            .with_ymd_and_hms(2024, 7, 15, 12, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn store(dir: &TempDir) -> (JsonDocumentStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(midsummer()));
        (JsonDocumentStore::new(dir.path(), clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_acquire_returns_same_instance() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store(&dir);
        let location = DocumentLocation::new("limits", "limitIp");

        let a = store.acquire::<Counters>(&location).await.unwrap();
        let b = store.acquire::<Counters>(&location).await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.cached_len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_acquire_loads_once() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store(&dir);
        let store = Arc::new(store);
        let location = DocumentLocation::new("limits", "limitIp");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let location = location.clone();
                tokio::spawn(async move { store.acquire::<Counters>(&location).await.unwrap() })
            })
            .collect();

        let docs: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert!(docs.iter().all(|d| Arc::ptr_eq(d, &docs[0])));
    }

    #[tokio::test]
    async fn test_reload_after_restart_sees_persisted_value() {
        let dir = TempDir::new().unwrap();
        let location = DocumentLocation::new("limits", "limitIp");

        {
            let (store, _) = store(&dir);
            let doc = store.acquire::<Counters>(&location).await.unwrap();
            doc.update(|c| c.insert("1.2.3.4".to_string(), 3)).await;
            store.persist::<Counters>(&location).await.unwrap();
        }

        let (store, _) = store(&dir);
        let doc = store.acquire::<Counters>(&location).await.unwrap();
        assert_eq!(doc.read(|c| c.get("1.2.3.4").copied()).await, Some(3));
        assert!(dir.path().join("limits/limitIp.json").exists());
    }

    #[tokio::test]
    async fn test_day_rollover_switches_partition_and_evicts() {
        let dir = TempDir::new().unwrap();
        let (store, clock) = store(&dir);
        let daily = DocumentLocation::day_partitioned("stats", "statistics");
        let fixed = DocumentLocation::new("limits", "limitIp");

        let today = store.acquire::<Counters>(&daily).await.unwrap();
        today.update(|c| c.insert("a".to_string(), 1)).await;
        today.persist().await.unwrap();
        store.acquire::<Counters>(&fixed).await.unwrap();

        clock.advance(TimeDelta::days(1));

        // Touching an unrelated location already drops yesterday's partition.
        store.acquire::<Counters>(&fixed).await.unwrap();
        assert_eq!(store.cached_len().await, 1);
        assert!(store.cached_partition(&daily).await.is_none());

        let tomorrow = store.acquire::<Counters>(&daily).await.unwrap();
        assert!(!Arc::ptr_eq(&today, &tomorrow));
        assert!(tomorrow.read(|c| c.is_empty()).await);
        assert_eq!(tomorrow.partition(), "2024-7-16");

        assert!(dir.path().join("stats/statistics_2024-7-15.json").exists());
    }

    #[tokio::test]
    async fn test_type_mismatch_is_reported() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store(&dir);
        let location = DocumentLocation::new("limits", "limitIp");

        store.acquire::<Counters>(&location).await.unwrap();
        let err = store.acquire::<Vec<String>>(&location).await.err();

        assert!(matches!(err, Some(StoreError::TypeMismatch(_))));
    }
}
