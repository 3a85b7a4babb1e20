//! A cached JSON document with a single-flight writer.
//!
//! Each document owns one writer task. `persist()` enqueues a waiter and
//! awaits it; the writer takes every waiter queued so far, serializes the
//! current value once, writes it, and answers all of them with the same
//! result. Waiters that arrive while a write is running are picked up by the
//! next cycle, so a resolved `persist()` always means the caller's mutation
//! is on disk.
//!
//! The writer lives on the runtime that spawned it. If that runtime shuts
//! down, the next `persist()` starts a new writer on the caller's runtime.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{RwLock, mpsc, oneshot};

use chatgate_core::clock::Clock;
use chatgate_core::error::StoreError;

type Waiter = oneshot::Sender<Result<(), StoreError>>;

/// Write bookkeeping shared with the writer task.
#[derive(Default)]
struct WriteState {
    writing: AtomicBool,
    pending: AtomicUsize,
    writes: AtomicU64,
    last_written_at: Mutex<Option<DateTime<Utc>>>,
}

/// One loaded document.
pub struct Document<T> {
    path: PathBuf,
    partition: String,
    value: Arc<RwLock<T>>,
    state: Arc<WriteState>,
    clock: Arc<dyn Clock>,
    requests: Mutex<mpsc::UnboundedSender<Waiter>>,
}

impl<T> Document<T>
where
    T: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
{
    /// Loads `path` (missing or unreadable files yield `T::default()`) and
    /// starts the writer task.
    pub(crate) async fn open(path: PathBuf, partition: String, clock: Arc<dyn Clock>) -> Self {
        let value = Arc::new(RwLock::new(load(&path).await));
        let state = Arc::new(WriteState::default());
        let requests = spawn_writer(&path, &value, &state, &clock);

        Self {
            path,
            partition,
            value,
            state,
            clock,
            requests: Mutex::new(requests),
        }
    }

    /// Reads the current value.
    pub async fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.value.read().await;
        f(&value)
    }

    /// Mutates the value in memory. Call [`Document::persist`] to make it durable.
    pub async fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut value = self.value.write().await;
        f(&mut value)
    }

    /// Writes the current value back to disk, coalescing with concurrent callers.
    ///
    /// A waiter orphaned by a stopped writer is retried once on a fresh one.
    pub async fn persist(&self) -> Result<(), StoreError> {
        for _ in 0..2 {
            let (tx, rx) = oneshot::channel();

            self.state.pending.fetch_add(1, Ordering::SeqCst);
            if self.sender().send(tx).is_err() {
                self.state.pending.fetch_sub(1, Ordering::SeqCst);
                continue;
            }

            if let Ok(result) = rx.await {
                return result;
            }
        }

        Err(StoreError::WriterClosed(self.path.display().to_string()))
    }

    /// Sender to a running writer, restarting it if its task is gone.
    fn sender(&self) -> mpsc::UnboundedSender<Waiter> {
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        if requests.is_closed() {
            tracing::warn!(document = %self.path.display(), "Document writer stopped, restarting");
            *requests = spawn_writer(&self.path, &self.value, &self.state, &self.clock);
        }
        requests.clone()
    }
}

impl<T> Document<T> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// True while a physical write is running.
    pub fn is_writing(&self) -> bool {
        self.state.writing.load(Ordering::SeqCst)
    }

    /// Persist calls queued but not yet attached to a write.
    pub fn pending_writes(&self) -> usize {
        self.state.pending.load(Ordering::SeqCst)
    }

    /// Physical writes completed successfully.
    pub fn write_count(&self) -> u64 {
        self.state.writes.load(Ordering::SeqCst)
    }

    pub fn last_written_at(&self) -> Option<DateTime<Utc>> {
        *self
            .state
            .last_written_at
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

async fn load<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => T::default(),
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::error!(document = %path.display(), error = %e, "Corrupt document, starting empty");
            T::default()
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => T::default(),
        Err(e) => {
            tracing::error!(document = %path.display(), error = %e, "Failed to read document, starting empty");
            T::default()
        }
    }
}

fn spawn_writer<T>(
    path: &Path,
    value: &Arc<RwLock<T>>,
    state: &Arc<WriteState>,
    clock: &Arc<dyn Clock>,
) -> mpsc::UnboundedSender<Waiter>
where
    T: Serialize + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(write_loop(
        path.to_path_buf(),
        value.clone(),
        state.clone(),
        rx,
        clock.clone(),
    ));
    tx
}

async fn write_loop<T>(
    path: PathBuf,
    value: Arc<RwLock<T>>,
    state: Arc<WriteState>,
    mut requests: mpsc::UnboundedReceiver<Waiter>,
    clock: Arc<dyn Clock>,
) where
    T: Serialize + Send + Sync + 'static,
{
    while let Some(first) = requests.recv().await {
        let mut waiters = vec![first];
        while let Ok(next) = requests.try_recv() {
            waiters.push(next);
        }
        state.pending.fetch_sub(waiters.len(), Ordering::SeqCst);

        state.writing.store(true, Ordering::SeqCst);
        let result = write_once(&path, &value).await;
        state.writing.store(false, Ordering::SeqCst);

        match &result {
            Ok(()) => {
                state.writes.fetch_add(1, Ordering::SeqCst);
                *state
                    .last_written_at
                    .lock()
                    .unwrap_or_else(|e| e.into_inner()) = Some(clock.now());
                tracing::debug!(document = %path.display(), waiters = waiters.len(), "Document written");
            }
            Err(e) => {
                tracing::error!(document = %path.display(), waiters = waiters.len(), error = %e, "Document write failed");
            }
        }

        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }

    tracing::debug!(document = %path.display(), "Document writer stopped");
}

async fn write_once<T: Serialize>(path: &Path, value: &RwLock<T>) -> Result<(), StoreError> {
    let display = path.display().to_string();

    let bytes = {
        let value = value.read().await;
        serde_json::to_vec_pretty(&*value).map_err(|e| StoreError::Encode {
            path: display.clone(),
            message: e.to_string(),
        })?
    };

    let write_err = |e: std::io::Error| StoreError::Write {
        path: display.clone(),
        message: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    // Write beside the target and rename so readers never see a partial file.
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(write_err)?;

    Ok(())
}
