//! Source registry: lifecycle and scheduling bookkeeping of calendar sources

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use hearth_domain::constants::{
    MAX_DISPLAY_NAME_LENGTH, MAX_REFRESH_INTERVAL_MINUTES, MIN_REFRESH_INTERVAL_MINUTES,
};
use hearth_domain::{
    CalendarSource, FeedCredential, FeedValidators, HearthError, NewSource, ProviderKind,
    RegisteredSource, Result, SourceId, SourceSummary, SyncConfig, SyncOutcome,
};
use tracing::{info, instrument, warn};
use url::Url;

use super::ports::{CredentialUpdate, OutcomeUpdate, SourceRepository};
use super::redact_owner;
use super::vault::{mask, normalize, CredentialVault};
use crate::clock::Clock;

const GOOGLE_API_HOST: &str = "www.googleapis.com";

/// Owns registration, deduplication, deactivation, and next-run cursors.
pub struct SourceRegistry {
    sources: Arc<dyn SourceRepository>,
    vault: Arc<CredentialVault>,
    clock: Arc<dyn Clock>,
    default_refresh_interval_minutes: u32,
    deactivate_after_failures: u32,
}

impl SourceRegistry {
    /// Registry over `sources`; cadence and deactivation limits come from `config`.
    pub fn new(
        sources: Arc<dyn SourceRepository>,
        vault: Arc<CredentialVault>,
        clock: Arc<dyn Clock>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            sources,
            vault,
            clock,
            default_refresh_interval_minutes: config.default_refresh_interval_minutes,
            deactivate_after_failures: config.deactivate_after_failures.max(1),
        }
    }

    /// Register a new feed for a child.
    ///
    /// Rejects invalid URLs and active duplicates for the same child before
    /// any write. The new source is immediately due.
    #[instrument(skip(self, request), fields(provider = %request.provider))]
    pub async fn register_source(&self, request: NewSource) -> Result<RegisteredSource> {
        let owner_id = require_text("owner id", &request.owner_id)?;
        let child_id = require_text("child id", &request.child_id)?;
        let display_name = validate_display_name(&request.display_name)?;
        let refresh_interval_minutes = self.refresh_interval(request.refresh_interval_minutes)?;

        let normalized = normalize(&request.raw_url)?;
        let oauth_account =
            validate_provider(request.provider, &normalized, request.oauth_account)?;
        let url_hash = self.vault.hash(&normalized);

        if let Some(existing) = self.sources.find_active_by_hash(&child_id, &url_hash).await? {
            return Err(duplicate(existing.id()));
        }

        let encrypted_url = self.vault.encrypt(&normalized)?;
        let now = self.clock.now();
        let id = SourceId::new();

        let registered = RegisteredSource {
            source: CalendarSource {
                id,
                owner_id,
                child_id,
                provider: request.provider,
                display_name,
                active: true,
                last_synced_at: None,
                created_at: now,
            },
            credential: FeedCredential {
                source_id: id,
                encrypted_url,
                url_hash,
                masked_url: mask(&normalized),
                oauth_account,
                validators: FeedValidators::default(),
                refresh_interval_minutes,
                next_run_at: now,
                consecutive_failures: 0,
            },
        };

        self.sources.insert_source(&registered).await?;

        info!(
            source_id = %id,
            owner = %redact_owner(&registered.source.owner_id),
            masked_url = %registered.credential.masked_url,
            refresh_interval_minutes,
            "calendar source registered"
        );
        Ok(registered)
    }

    /// Mark a source inactive. Historical events stay untouched.
    #[instrument(skip(self))]
    pub async fn deactivate_source(&self, id: SourceId) -> Result<()> {
        let source = self.get(id).await?;
        if !source.source.active {
            return Ok(());
        }
        self.sources.set_active(id, false).await?;
        info!(source_id = %id, "calendar source deactivated");
        Ok(())
    }

    /// Active sources with `next_run_at <= now`, most overdue first.
    pub async fn due_sources(&self, now: DateTime<Utc>) -> Result<Vec<RegisteredSource>> {
        self.sources.due_sources(now).await
    }

    /// Persist the bookkeeping of a finished sync attempt.
    ///
    /// Every attempt stamps `last_synced_at` and pushes `next_run_at` one
    /// full interval out, so a failing feed is retried at its normal cadence.
    pub async fn record_sync_outcome(
        &self,
        id: SourceId,
        outcome: SyncOutcome,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let current = self.get(id).await?;
        let interval = Duration::minutes(i64::from(current.credential.refresh_interval_minutes));
        let failures = current.credential.consecutive_failures;

        let (validators, consecutive_failures) = match outcome {
            SyncOutcome::Refreshed(validators) => (Some(validators), 0),
            SyncOutcome::NotModified => (None, 0),
            SyncOutcome::Failed { upstream_rejected: true } => (None, failures.saturating_add(1)),
            SyncOutcome::Failed { upstream_rejected: false } => (None, failures),
        };
        let deactivate =
            current.source.active && consecutive_failures >= self.deactivate_after_failures;

        self.sources
            .record_outcome(
                id,
                &OutcomeUpdate {
                    validators,
                    last_synced_at: now,
                    next_run_at: now + interval,
                    consecutive_failures,
                    deactivate,
                },
            )
            .await?;

        if deactivate {
            warn!(
                source_id = %id,
                consecutive_failures,
                "upstream keeps rejecting feed, source deactivated"
            );
        }
        Ok(())
    }

    /// Point an existing source at a new feed URL.
    ///
    /// Validators are reset so the next run does a full fetch; stored events
    /// are kept and reconciled against the new feed.
    #[instrument(skip(self, raw_url))]
    pub async fn replace_credential(
        &self,
        id: SourceId,
        raw_url: &str,
        oauth_account: Option<String>,
    ) -> Result<RegisteredSource> {
        let current = self.get(id).await?;
        if !current.source.active {
            return Err(HearthError::Inactive(id.to_string()));
        }

        let normalized = normalize(raw_url)?;
        let oauth_account = validate_provider(
            current.source.provider,
            &normalized,
            oauth_account.or_else(|| current.credential.oauth_account.clone()),
        )?;
        let url_hash = self.vault.hash(&normalized);

        if let Some(existing) =
            self.sources.find_active_by_hash(&current.source.child_id, &url_hash).await?
        {
            if existing.id() != id {
                return Err(duplicate(existing.id()));
            }
        }

        let update = CredentialUpdate {
            encrypted_url: self.vault.encrypt(&normalized)?,
            url_hash,
            masked_url: mask(&normalized),
            oauth_account,
            next_run_at: self.clock.now(),
        };
        self.sources.update_credential(id, &update).await?;

        info!(source_id = %id, masked_url = %update.masked_url, "feed credential replaced");
        self.get(id).await
    }

    /// Display-safe listing of an owner's sources.
    pub async fn list_sources(&self, owner_id: &str) -> Result<Vec<SourceSummary>> {
        let sources = self.sources.list_sources_for_owner(owner_id).await?;
        Ok(sources.iter().map(RegisteredSource::summary).collect())
    }

    /// Load a source regardless of owner.
    pub async fn get(&self, id: SourceId) -> Result<RegisteredSource> {
        self.sources
            .get_source(id)
            .await?
            .ok_or_else(|| HearthError::NotFound(format!("calendar source {id}")))
    }

    /// Load a source on behalf of `owner_id`.
    ///
    /// Sources belonging to someone else are reported as not found.
    pub async fn get_owned(&self, owner_id: &str, id: SourceId) -> Result<RegisteredSource> {
        let source = self.get(id).await?;
        if source.source.owner_id != owner_id {
            return Err(HearthError::NotFound(format!("calendar source {id}")));
        }
        Ok(source)
    }

    fn refresh_interval(&self, requested: Option<u32>) -> Result<u32> {
        let minutes = requested.unwrap_or(self.default_refresh_interval_minutes);
        if !(MIN_REFRESH_INTERVAL_MINUTES..=MAX_REFRESH_INTERVAL_MINUTES).contains(&minutes) {
            return Err(HearthError::Validation(format!(
                "refresh interval must be between {MIN_REFRESH_INTERVAL_MINUTES} and \
                 {MAX_REFRESH_INTERVAL_MINUTES} minutes"
            )));
        }
        Ok(minutes)
    }
}

fn duplicate(existing: SourceId) -> HearthError {
    HearthError::DuplicateSource(format!(
        "feed is already connected to this child as source {existing}"
    ))
}

fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(HearthError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn validate_display_name(name: &str) -> Result<String> {
    let name = require_text("display name", name)?;
    if name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(HearthError::Validation(format!(
            "display name exceeds {MAX_DISPLAY_NAME_LENGTH} characters"
        )));
    }
    Ok(name)
}

/// Provider-specific credential shape checks.
fn validate_provider(
    provider: ProviderKind,
    normalized_url: &str,
    oauth_account: Option<String>,
) -> Result<Option<String>> {
    let oauth_account = oauth_account.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
    match provider {
        ProviderKind::IcsFeed => Ok(None),
        ProviderKind::GoogleCalendar => {
            let url = Url::parse(normalized_url)
                .map_err(|e| HearthError::Validation(format!("malformed feed URL: {e}")))?;
            if url.scheme() != "https" || url.host_str() != Some(GOOGLE_API_HOST) {
                return Err(HearthError::Validation(format!(
                    "Google Calendar sources must use https://{GOOGLE_API_HOST}"
                )));
            }
            oauth_account.map(Some).ok_or_else(|| {
                HearthError::Validation(
                    "Google Calendar sources require an OAuth account".to_string(),
                )
            })
        }
    }
}
