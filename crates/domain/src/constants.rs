//! Application constants
//!
//! Centralized location for domain-level defaults used by the registry,
//! orchestrator, and configuration.

// Source cadence
pub const DEFAULT_REFRESH_INTERVAL_MINUTES: u32 = 30;
pub const MIN_REFRESH_INTERVAL_MINUTES: u32 = 5;
pub const MAX_REFRESH_INTERVAL_MINUTES: u32 = 24 * 60;

// Manual sync rate limit
pub const MANUAL_SYNC_MIN_INTERVAL_SECS: u64 = 5 * 60;

// Feed fetching
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_USER_AGENT: &str = concat!("hearth-calendar/", env!("CARGO_PKG_VERSION"));
pub const MAX_FEED_BYTES: usize = 10 * 1024 * 1024;

// Batch sweep
pub const DEFAULT_SWEEP_CONCURRENCY: usize = 4;
pub const DEFAULT_DEACTIVATE_AFTER_FAILURES: u32 = 5;
pub const DEFAULT_SWEEP_CRON: &str = "0 */5 * * * *";
pub const DEFAULT_SCHEDULER_JOB_TIMEOUT_SECS: u64 = 240;

// Key material
pub const DEFAULT_VAULT_KEY_ENV: &str = "HEARTH_FEED_KEY";
pub const DEFAULT_SCHEDULER_SECRET_ENV: &str = "HEARTH_SCHEDULER_SECRET";

// Text limits
pub const MAX_DISPLAY_NAME_LENGTH: usize = 120;
pub const MAX_FEED_URL_LENGTH: usize = 2048;
