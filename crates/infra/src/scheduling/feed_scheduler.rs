//! Periodic feed sweep scheduler.
//!
//! Triggers [`SyncOrchestrator::sync_due`] on a cron schedule. Each run is
//! bounded by a job timeout and observes a cancellation token so shutdown
//! does not wait on a slow sweep.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hearth_core::SyncOrchestrator;
use hearth_domain::{SchedulerConfig, SweepReport};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the feed sweep scheduler.
#[derive(Debug, Clone)]
pub struct FeedSchedulerConfig {
    /// Cron expression (with seconds) describing the execution schedule.
    pub cron_expression: String,
    /// Timeout applied to a single sweep.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
}

impl Default for FeedSchedulerConfig {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

impl From<&SchedulerConfig> for FeedSchedulerConfig {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            cron_expression: config.cron_expression.clone(),
            job_timeout: Duration::from_secs(config.job_timeout_secs.max(1)),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

/// Feed sweep scheduler with explicit lifecycle management.
pub struct FeedSyncScheduler {
    scheduler: Option<JobScheduler>,
    config: FeedSchedulerConfig,
    cancellation: CancellationToken,
    orchestrator: Arc<SyncOrchestrator>,
}

impl FeedSyncScheduler {
    /// Scheduler in the stopped state; call `start` to register the sweep job.
    pub fn new(config: FeedSchedulerConfig, orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self { scheduler: None, config, cancellation: CancellationToken::new(), orchestrator }
    }

    /// Start the scheduler and register the sweep job.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler_instance = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;

        tokio::time::timeout(start_timeout, scheduler_instance.start())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?
            .map_err(|source| SchedulerError::StartFailed { source })?;

        self.scheduler = Some(scheduler_instance);
        info!(cron = %self.config.cron_expression, "feed sync scheduler started");
        Ok(())
    }

    /// Cancel any running sweep and shut the scheduler down.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(mut scheduler) = self.scheduler.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation.cancel();

        let stop_timeout = self.config.stop_timeout;
        tokio::time::timeout(stop_timeout, async move { scheduler.shutdown().await })
            .await
            .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?
            .map_err(|source| SchedulerError::StopFailed { source })?;

        info!("feed sync scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when a scheduler instance is active.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Run one sweep immediately with the same timeout and cancellation rules
    /// as a scheduled run.
    pub async fn run_once(&self) -> SchedulerResult<SweepReport> {
        run_sweep(self.orchestrator.clone(), self.cancellation.clone(), self.config.job_timeout)
            .await
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed { source })?;

        let orchestrator = self.orchestrator.clone();
        let cancel = self.cancellation.clone();
        let job_timeout = self.config.job_timeout;

        let job_definition =
            Job::new_async(self.config.cron_expression.as_str(), move |_id, _lock| {
                let orchestrator = orchestrator.clone();
                let cancel = cancel.clone();

                Box::pin(async move {
                    if cancel.is_cancelled() {
                        debug!("scheduler cancelled; skipping feed sweep");
                        return;
                    }
                    if let Err(err) = run_sweep(orchestrator, cancel, job_timeout).await {
                        match err {
                            SchedulerError::Cancelled => debug!("feed sweep cancelled"),
                            SchedulerError::Timeout { duration, .. } => {
                                warn!(timeout_secs = duration.as_secs(), "feed sweep timed out");
                            }
                            other => error!(error = %other, "feed sweep failed"),
                        }
                    }
                })
            })
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        let job_id = job_definition.guid();
        scheduler
            .add(job_definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        debug!(cron = %self.config.cron_expression, job_id = %job_id, "registered feed sweep job");
        Ok(scheduler)
    }
}

async fn run_sweep(
    orchestrator: Arc<SyncOrchestrator>,
    cancel: CancellationToken,
    job_timeout: Duration,
) -> SchedulerResult<SweepReport> {
    let started = Instant::now();

    let report = tokio::select! {
        _ = cancel.cancelled() => return Err(SchedulerError::Cancelled),
        result = tokio::time::timeout(job_timeout, orchestrator.sync_due()) => {
            result.map_err(|source| SchedulerError::Timeout { duration: job_timeout, source })??
        }
    };

    info!(
        synced = report.synced_count,
        skipped = report.skipped,
        errors = report.errors.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "scheduled feed sweep completed"
    );
    Ok(report)
}

impl Drop for FeedSyncScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("FeedSyncScheduler dropped while running; cancelling sweep");
            self.cancellation.cancel();
        }
    }
}
