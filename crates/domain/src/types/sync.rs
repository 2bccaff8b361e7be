//! Sync run results and bookkeeping

use serde::{Deserialize, Serialize};

use super::source::{FeedValidators, SourceId};
use crate::errors::HearthError;

/// Stage of a single-source sync run.
///
/// `Idle -> Fetching -> (NotModified | Parsing -> Reconciling -> Persisting) -> Idle`;
/// any stage may fail back to `Idle` with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Decrypting,
    Fetching,
    NotModified,
    Parsing,
    Reconciling,
    Persisting,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Decrypting => "decrypting",
            Self::Fetching => "fetching",
            Self::NotModified => "not_modified",
            Self::Parsing => "parsing",
            Self::Reconciling => "reconciling",
            Self::Persisting => "persisting",
        }
    }
}

/// One failure recorded during a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncErrorDescriptor {
    pub source_id: SourceId,
    pub phase: SyncPhase,
    pub code: String,
    pub error: HearthError,
}

impl SyncErrorDescriptor {
    pub fn new(source_id: SourceId, phase: SyncPhase, error: HearthError) -> Self {
        Self { source_id, phase, code: error.code().to_string(), error }
    }
}

/// Result of one source's sync run. Returned and logged, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub source_id: SourceId,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub candidates_found: usize,
    pub not_modified: bool,
    pub errors: Vec<SyncErrorDescriptor>,
}

impl SyncResult {
    pub fn empty(source_id: SourceId) -> Self {
        Self {
            source_id,
            created: 0,
            updated: 0,
            deleted: 0,
            candidates_found: 0,
            not_modified: false,
            errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn mutations(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Aggregate of a batch sweep over due sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Sources that completed without error, including not-modified ones.
    pub synced_count: usize,
    /// Due sources not started before the wall-clock budget ran out, or
    /// already synced by a concurrent trigger.
    pub skipped: usize,
    pub errors: Vec<SyncErrorDescriptor>,
}

/// What a finished sync run tells the registry about a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Feed fetched and applied; validators replace the stored ones.
    Refreshed(FeedValidators),
    /// Upstream reported no change; stored validators stay.
    NotModified,
    /// Run failed; stored validators stay. `upstream_rejected` counts toward
    /// automatic deactivation.
    Failed { upstream_rejected: bool },
}
