//! Manual sync rate limiting
//!
//! Only user-triggered syncs go through this limiter; the batch sweep is
//! paced by each source's `next_run_at`.

use chrono::{DateTime, Duration, Utc};
use hearth_domain::constants::MANUAL_SYNC_MIN_INTERVAL_SECS;
use hearth_domain::{HearthError, Result};

/// Minimum spacing between manual syncs of the same source.
#[derive(Debug, Clone, Copy)]
pub struct ManualSyncLimiter {
    min_interval: Duration,
}

impl Default for ManualSyncLimiter {
    fn default() -> Self {
        Self::new(MANUAL_SYNC_MIN_INTERVAL_SECS)
    }
}

impl ManualSyncLimiter {
    /// Limiter allowing one manual sync per `min_interval_secs` per source.
    pub fn new(min_interval_secs: u64) -> Self {
        let secs = i64::try_from(min_interval_secs).unwrap_or(i64::MAX / 1_000);
        Self { min_interval: Duration::seconds(secs) }
    }

    /// `true` when a source last synced at `last_synced_at` may sync at `now`.
    pub fn can_sync_now(&self, last_synced_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        self.retry_after(last_synced_at, now).is_none()
    }

    /// Reject with a retry-after hint when the source synced too recently.
    pub fn check(&self, last_synced_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<()> {
        match self.retry_after(last_synced_at, now) {
            Some(wait) => Err(HearthError::RateLimited { retry_after_secs: wait }),
            None => Ok(()),
        }
    }

    fn retry_after(
        &self,
        last_synced_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<u64> {
        let last = last_synced_at?;
        // A last-sync stamp in the future (clock skew) counts as "just now".
        let elapsed = (now - last).max(Duration::zero());
        if elapsed >= self.min_interval {
            return None;
        }
        let remaining = self.min_interval - elapsed;
        let secs = remaining.num_seconds() + i64::from(remaining.subsec_nanos() > 0);
        Some(u64::try_from(secs.max(1)).unwrap_or(1))
    }
}
