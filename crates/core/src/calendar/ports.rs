//! Port interfaces for calendar ingestion
//!
//! These traits define the boundaries between the sync engine and the
//! storage, HTTP, and parsing adapters in `hearth-infra`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hearth_common::SecureString;
use hearth_domain::{
    CalendarEvent, EventChangeSet, FeedValidators, HearthError, ParsedEvent, ProviderKind,
    RegisteredSource, Result, SourceId,
};

/// Persistence of sources and their feed credentials.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Insert a new source and credential.
    ///
    /// Must fail with [`HearthError::DuplicateSource`] if an active source
    /// with the same child and URL hash already exists.
    async fn insert_source(&self, source: &RegisteredSource) -> Result<()>;

    /// Active source attached to `child_id` with the given URL hash.
    async fn find_active_by_hash(
        &self,
        child_id: &str,
        url_hash: &str,
    ) -> Result<Option<RegisteredSource>>;

    async fn get_source(&self, id: SourceId) -> Result<Option<RegisteredSource>>;

    async fn list_sources_for_owner(&self, owner_id: &str) -> Result<Vec<RegisteredSource>>;

    /// Active sources with `next_run_at <= now`, most overdue first.
    async fn due_sources(&self, now: DateTime<Utc>) -> Result<Vec<RegisteredSource>>;

    async fn set_active(&self, id: SourceId, active: bool) -> Result<()>;

    /// Swap the feed location and reset validators and failure count.
    async fn update_credential(&self, id: SourceId, update: &CredentialUpdate) -> Result<()>;

    /// Persist post-sync bookkeeping.
    async fn record_outcome(&self, id: SourceId, update: &OutcomeUpdate) -> Result<()>;
}

/// Persistence of each source's event set.
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn events_for_source(&self, source_id: SourceId) -> Result<Vec<CalendarEvent>>;

    /// Apply a change set atomically: either every mutation lands or none.
    async fn apply_changes(&self, source_id: SourceId, changes: &EventChangeSet) -> Result<()>;
}

/// Fetch and parse capability for one provider kind.
#[async_trait]
pub trait FeedProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Conditional retrieval using the validators in `request`.
    ///
    /// Failures are [`HearthError::Transport`] or
    /// [`HearthError::UpstreamRejected`].
    async fn fetch(&self, request: FetchRequest) -> Result<FetchOutcome>;

    /// Turn a fetched body into event records.
    ///
    /// A malformed body is [`HearthError::Parse`]; a well-formed body with no
    /// events is `Ok(vec![])`.
    fn parse(&self, body: &str) -> Result<Vec<ParsedEvent>>;
}

/// Supplies OAuth access tokens for provider accounts.
///
/// Token exchange and refresh live outside this workspace.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self, account: &str) -> Result<SecureString>;
}

/// Input to [`FeedProvider::fetch`].
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub source_id: SourceId,
    pub url: SecureString,
    pub validators: FeedValidators,
    pub oauth_account: Option<String>,
}

/// Result of a conditional fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched { body: String, validators: FeedValidators },
    NotModified,
}

/// New feed location for an existing source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub encrypted_url: String,
    pub url_hash: String,
    pub masked_url: String,
    pub oauth_account: Option<String>,
    pub next_run_at: DateTime<Utc>,
}

/// Bookkeeping written after every sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeUpdate {
    /// `Some` replaces stored validators; `None` keeps them.
    pub validators: Option<FeedValidators>,
    pub last_synced_at: DateTime<Utc>,
    pub next_run_at: DateTime<Utc>,
    pub consecutive_failures: u32,
    pub deactivate: bool,
}

/// Feed providers keyed by the kind they serve.
#[derive(Clone, Default)]
pub struct FeedProviders {
    providers: HashMap<ProviderKind, Arc<dyn FeedProvider>>,
}

impl FeedProviders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` for the kind it reports, replacing any previous one.
    pub fn with(mut self, provider: Arc<dyn FeedProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    /// Provider for `kind`, or a configuration error when none is wired.
    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn FeedProvider>> {
        self.providers.get(&kind).cloned().ok_or_else(|| {
            HearthError::Configuration(format!("no feed provider configured for {kind}"))
        })
    }

    pub fn supports(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }
}

impl std::fmt::Debug for FeedProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedProviders").field("kinds", &self.providers.keys()).finish()
    }
}
