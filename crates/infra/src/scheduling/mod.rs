//! Cron-driven background jobs

pub mod error;
pub mod feed_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use feed_scheduler::{FeedSchedulerConfig, FeedSyncScheduler};
