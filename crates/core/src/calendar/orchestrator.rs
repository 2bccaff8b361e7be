//! Sync orchestrator: drives sources through fetch, parse, reconcile, and
//! persist, one at a time (manual) or as a budgeted sweep (batch).

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use hearth_domain::{
    HearthError, RegisteredSource, Result, SourceId, SweepReport, SyncConfig,
    SyncErrorDescriptor, SyncOutcome, SyncPhase, SyncResult,
};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::in_flight::{InFlightSources, InFlightTicket};
use super::ports::{EventRepository, FeedProviders, FetchOutcome, FetchRequest};
use super::rate_limiter::ManualSyncLimiter;
use super::reconciler::reconcile;
use super::registry::SourceRegistry;
use super::vault::CredentialVault;
use crate::clock::Clock;

/// Tunables for sync runs.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub fetch_timeout: Duration,
    pub sweep_concurrency: usize,
    pub sweep_budget: Option<Duration>,
    pub manual_min_interval_secs: u64,
}

impl From<&SyncConfig> for OrchestratorSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs.max(1)),
            sweep_concurrency: config.sweep_concurrency.max(1),
            sweep_budget: config.sweep_budget_secs.map(Duration::from_secs),
            manual_min_interval_secs: config.manual_min_interval_secs,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

/// What happened to one due source during a sweep.
enum SweepItem {
    Ran(SyncResult),
    Skipped,
    Failed(SyncErrorDescriptor),
}

/// Runs calendar syncs for registered sources.
///
/// At most one sync per source runs at a time in this process; every run
/// re-reads its source after claiming it so cursors and validators written
/// by a sync that just finished are honoured.
pub struct SyncOrchestrator {
    registry: Arc<SourceRegistry>,
    events: Arc<dyn EventRepository>,
    providers: FeedProviders,
    vault: Arc<CredentialVault>,
    clock: Arc<dyn Clock>,
    limiter: ManualSyncLimiter,
    in_flight: InFlightSources,
    settings: OrchestratorSettings,
}

impl SyncOrchestrator {
    /// Wire an orchestrator over the registry, event store, and providers.
    pub fn new(
        registry: Arc<SourceRegistry>,
        events: Arc<dyn EventRepository>,
        providers: FeedProviders,
        vault: Arc<CredentialVault>,
        clock: Arc<dyn Clock>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            registry,
            events,
            providers,
            vault,
            clock,
            limiter: ManualSyncLimiter::new(settings.manual_min_interval_secs),
            in_flight: InFlightSources::new(),
            settings,
        }
    }

    /// Registry the orchestrator reads sources from.
    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// User-triggered sync of one source.
    ///
    /// Rejected before any feed I/O when the source belongs to someone else,
    /// is already syncing, is inactive, or synced within the rate-limit
    /// window. The last two are checked against a read taken after the
    /// source is claimed.
    #[instrument(skip(self, owner_id))]
    pub async fn sync_manual(&self, owner_id: &str, source_id: SourceId) -> Result<SyncResult> {
        self.registry.get_owned(owner_id, source_id).await?;
        let ticket = self.claim(source_id)?;

        let source = self.registry.get_owned(owner_id, source_id).await?;
        if !source.source.active {
            return Err(HearthError::Inactive(source_id.to_string()));
        }
        self.limiter.check(source.source.last_synced_at, self.clock.now())?;
        Ok(self.run(&source, ticket).await)
    }

    /// Run one source end to end, regardless of schedule.
    ///
    /// `source` only identifies the row; the pipeline runs against the stored
    /// state read after claiming it. Pipeline failures land in
    /// [`SyncResult::errors`]; a concurrent sync of the same source or a
    /// failed read is returned as `Err`.
    pub async fn sync_one(&self, source: &RegisteredSource) -> Result<SyncResult> {
        let ticket = self.claim(source.id())?;
        let fresh = self.registry.get(source.id()).await?;
        Ok(self.run(&fresh, ticket).await)
    }

    fn claim(&self, id: SourceId) -> Result<InFlightTicket> {
        self.in_flight
            .try_acquire(id)
            .ok_or_else(|| HearthError::SyncInProgress(id.to_string()))
    }

    /// Sweep every due source using the configured budget.
    pub async fn sync_due(&self) -> Result<SweepReport> {
        self.sync_due_within(self.settings.sweep_budget).await
    }

    /// Sweep every due source, most overdue first.
    ///
    /// Sources not started before `budget` elapses are counted as skipped.
    /// One source failing never aborts its siblings.
    #[instrument(skip(self))]
    pub async fn sync_due_within(&self, budget: Option<Duration>) -> Result<SweepReport> {
        let started = Instant::now();
        let deadline = budget.map(|b| started + b);
        let now = self.clock.now();
        let due = self.registry.due_sources(now).await?;
        let total = due.len();

        let items: Vec<SweepItem> = stream::iter(due)
            .map(|source| async move {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return SweepItem::Skipped;
                }
                self.sweep_source(source, now).await
            })
            .buffer_unordered(self.settings.sweep_concurrency)
            .collect()
            .await;

        let mut report = SweepReport::default();
        for item in items {
            match item {
                SweepItem::Ran(result) if result.is_success() => report.synced_count += 1,
                SweepItem::Ran(result) => report.errors.extend(result.errors),
                SweepItem::Skipped => report.skipped += 1,
                SweepItem::Failed(descriptor) => report.errors.push(descriptor),
            }
        }

        info!(
            due = total,
            synced = report.synced_count,
            skipped = report.skipped,
            errors = report.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "calendar sweep finished"
        );
        Ok(report)
    }

    async fn sweep_source(
        &self,
        listed: RegisteredSource,
        sweep_now: chrono::DateTime<chrono::Utc>,
    ) -> SweepItem {
        let id = listed.id();
        let Ok(ticket) = self.claim(id) else {
            debug!(source_id = %id, "source already syncing, skipping");
            return SweepItem::Skipped;
        };

        // Re-read under the ticket: another sync may have advanced the cursor since listing.
        let fresh = match self.registry.get(id).await {
            Ok(fresh) => fresh,
            Err(err) => {
                return SweepItem::Failed(SyncErrorDescriptor::new(id, SyncPhase::Idle, err));
            }
        };
        if !fresh.source.active || fresh.credential.next_run_at > sweep_now {
            debug!(source_id = %id, "source no longer due, skipping");
            return SweepItem::Skipped;
        }
        SweepItem::Ran(self.run(&fresh, ticket).await)
    }

    async fn run(&self, source: &RegisteredSource, _ticket: InFlightTicket) -> SyncResult {
        let id = source.id();
        let mut result = SyncResult::empty(id);
        let started = Instant::now();

        match self.pipeline(source, &mut result).await {
            Ok(outcome) => {
                if let Err(err) =
                    self.registry.record_sync_outcome(id, outcome, self.clock.now()).await
                {
                    error!(source_id = %id, error = %err, "failed to record sync outcome");
                    result.errors.push(SyncErrorDescriptor::new(id, SyncPhase::Persisting, err));
                }
            }
            Err((phase, err)) => {
                warn!(
                    source_id = %id,
                    masked_url = %source.credential.masked_url,
                    phase = phase.as_str(),
                    error_code = err.code(),
                    error = %err,
                    "calendar sync failed"
                );
                let outcome = SyncOutcome::Failed {
                    upstream_rejected: matches!(err, HearthError::UpstreamRejected(_)),
                };
                result.errors.push(SyncErrorDescriptor::new(id, phase, err));
                if let Err(record_err) =
                    self.registry.record_sync_outcome(id, outcome, self.clock.now()).await
                {
                    error!(source_id = %id, error = %record_err, "failed to record sync failure");
                    result
                        .errors
                        .push(SyncErrorDescriptor::new(id, SyncPhase::Persisting, record_err));
                }
            }
        }

        info!(
            source_id = %id,
            created = result.created,
            updated = result.updated,
            deleted = result.deleted,
            candidates = result.candidates_found,
            not_modified = result.not_modified,
            errors = result.errors.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "calendar sync completed"
        );
        result
    }

    /// Idle -> Decrypting -> Fetching -> (NotModified | Parsing -> Reconciling -> Persisting).
    async fn pipeline(
        &self,
        source: &RegisteredSource,
        result: &mut SyncResult,
    ) -> std::result::Result<SyncOutcome, (SyncPhase, HearthError)> {
        let id = source.id();
        let at = |phase: SyncPhase| move |err: HearthError| (phase, err);

        debug!(source_id = %id, phase = SyncPhase::Decrypting.as_str(), "sync phase");
        let url = self
            .vault
            .decrypt(&source.credential.encrypted_url)
            .map_err(at(SyncPhase::Decrypting))?;
        let provider =
            self.providers.get(source.source.provider).map_err(at(SyncPhase::Fetching))?;

        debug!(source_id = %id, phase = SyncPhase::Fetching.as_str(), "sync phase");
        let request = FetchRequest {
            source_id: id,
            url,
            validators: source.credential.validators.clone(),
            oauth_account: source.credential.oauth_account.clone(),
        };
        let fetched = tokio::time::timeout(self.settings.fetch_timeout, provider.fetch(request))
            .await
            .map_err(|_| {
                HearthError::Transport(format!(
                    "feed fetch timed out after {}s",
                    self.settings.fetch_timeout.as_secs()
                ))
            })
            .and_then(|outcome| outcome)
            .map_err(at(SyncPhase::Fetching))?;

        let (body, validators) = match fetched {
            FetchOutcome::NotModified => {
                debug!(source_id = %id, phase = SyncPhase::NotModified.as_str(), "sync phase");
                result.not_modified = true;
                return Ok(SyncOutcome::NotModified);
            }
            FetchOutcome::Fetched { body, validators } => (body, validators),
        };

        debug!(
            source_id = %id,
            phase = SyncPhase::Parsing.as_str(),
            bytes = body.len(),
            "sync phase"
        );
        let parsed = provider.parse(&body).map_err(at(SyncPhase::Parsing))?;
        result.candidates_found = parsed.len();

        debug!(source_id = %id, phase = SyncPhase::Reconciling.as_str(), "sync phase");
        let persisted =
            self.events.events_for_source(id).await.map_err(at(SyncPhase::Reconciling))?;
        let changes = reconcile(id, parsed, &persisted, self.clock.now());

        debug!(source_id = %id, phase = SyncPhase::Persisting.as_str(), "sync phase");
        if !changes.is_empty() {
            self.events.apply_changes(id, &changes).await.map_err(at(SyncPhase::Persisting))?;
        }
        result.created = changes.to_create.len();
        result.updated = changes.to_update.len();
        result.deleted = changes.to_delete.len();

        Ok(SyncOutcome::Refreshed(validators))
    }
}
