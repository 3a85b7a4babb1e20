//! Maintenance jobs on tokio-cron-scheduler.

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use chatgate_infra::InMemoryWindowLimiters;

/// Every ten minutes, on the minute.
pub const PURGE_SCHEDULE: &str = "0 */10 * * * *";

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Enable scheduler.
    pub enabled: bool,
    /// Cron expression for the limiter purge.
    pub purge_schedule: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            purge_schedule: PURGE_SCHEDULE.to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("SCHEDULER_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            purge_schedule: std::env::var("PURGE_SCHEDULE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| PURGE_SCHEDULE.to_string()),
        }
    }
}

/// Cron job scheduler wrapper.
pub struct Scheduler {
    inner: JobScheduler,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a new scheduler.
    pub async fn new(config: SchedulerConfig) -> Result<Self, JobSchedulerError> {
        let inner = JobScheduler::new().await?;
        Ok(Self { inner, config })
    }

    /// Add a cron job.
    pub async fn add_cron<F, Fut>(
        &self,
        schedule: &str,
        task: F,
    ) -> Result<uuid::Uuid, JobSchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let job = Job::new_async(schedule, move |_uuid, _lock| {
            let task = task.clone();
            Box::pin(async move {
                task().await;
            })
        })?;

        let id = self.inner.add(job).await?;
        tracing::info!(schedule = %schedule, job_id = %id, "Cron job registered");
        Ok(id)
    }

    /// Registers the periodic purge of closed limiter windows.
    pub async fn add_limiter_purge(
        &self,
        profiles: Vec<(&'static str, InMemoryWindowLimiters)>,
    ) -> Result<uuid::Uuid, JobSchedulerError> {
        let schedule = self.config.purge_schedule.clone();

        self.add_cron(&schedule, move || {
            let profiles = profiles.clone();
            async move {
                for (profile, limiters) in &profiles {
                    let purged = limiters.purge_expired();
                    if purged > 0 {
                        tracing::debug!(profile = %profile, purged = purged, "Purged expired limiter windows");
                    }
                }
            }
        })
        .await
    }

    /// Start the scheduler.
    pub async fn start(&self) -> Result<(), JobSchedulerError> {
        if !self.config.enabled {
            tracing::info!("Scheduler disabled");
            return Ok(());
        }

        self.inner.start().await?;
        tracing::info!("Scheduler started");
        Ok(())
    }

    /// Stop the scheduler.
    pub async fn shutdown(&mut self) -> Result<(), JobSchedulerError> {
        self.inner.shutdown().await?;
        tracing::info!("Scheduler stopped");
        Ok(())
    }
}
