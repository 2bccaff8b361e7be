//! Calendar event models and reconciliation output

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::source::SourceId;

/// Stable external key of an event within one source.
///
/// Content may change across syncs while the key stays the same.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventKey {
    pub uid: String,
    pub recurrence_id: Option<String>,
}

impl EventKey {
    pub fn new(uid: impl Into<String>, recurrence_id: Option<String>) -> Self {
        Self { uid: uid.into(), recurrence_id }
    }
}

/// When an event happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventTiming {
    Timed { start: DateTime<Utc>, end: DateTime<Utc> },
    /// Date range with an exclusive end date.
    AllDay { start: NaiveDate, end: NaiveDate },
}

/// Mutable content of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContent {
    pub title: String,
    pub timing: EventTiming,
    pub location: Option<String>,
}

/// One occurrence as produced by a feed parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEvent {
    pub key: EventKey,
    pub content: EventContent,
}

/// One persisted occurrence belonging to a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub source_id: SourceId,
    pub key: EventKey,
    pub content: EventContent,
    pub content_hash: String,
    pub first_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Minimal set of mutations that brings a source's event set in line with
/// the newest parsed feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventChangeSet {
    pub to_create: Vec<CalendarEvent>,
    pub to_update: Vec<CalendarEvent>,
    pub to_delete: Vec<EventKey>,
}

impl EventChangeSet {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}
