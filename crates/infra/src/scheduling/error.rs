//! Scheduler error types

use std::time::Duration;

use hearth_domain::HearthError;
use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

use crate::errors::InfraError;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("scheduler already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("scheduler not running")]
    NotRunning,

    /// Failed to create scheduler
    #[error("failed to create scheduler")]
    CreationFailed {
        #[source]
        source: JobSchedulerError,
    },

    /// Failed to start scheduler
    #[error("failed to start scheduler")]
    StartFailed {
        #[source]
        source: JobSchedulerError,
    },

    /// Failed to stop scheduler
    #[error("failed to stop scheduler")]
    StopFailed {
        #[source]
        source: JobSchedulerError,
    },

    /// Failed to register job (usually an invalid cron expression)
    #[error("failed to register job")]
    JobRegistrationFailed {
        #[source]
        source: JobSchedulerError,
    },

    /// Operation timed out
    #[error("operation timed out after {duration:?}")]
    Timeout {
        duration: Duration,
        #[source]
        source: tokio::time::error::Elapsed,
    },

    /// The sweep itself failed before any source was attempted
    #[error("feed sweep failed: {0}")]
    Sweep(#[from] HearthError),

    /// The sweep was cancelled by a shutdown request
    #[error("feed sweep cancelled")]
    Cancelled,
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let hearth_err = match err {
            SchedulerError::Sweep(inner) => inner,
            SchedulerError::JobRegistrationFailed { .. } => {
                HearthError::Configuration(format!("{err}: check the cron expression"))
            }
            other => HearthError::Internal(other.to_string()),
        };
        InfraError(hearth_err)
    }
}

impl From<SchedulerError> for HearthError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
