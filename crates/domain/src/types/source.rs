//! Calendar source and feed credential models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::HearthError;

/// Opaque, stable identifier of a calendar source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub Uuid);

impl SourceId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SourceId {
    type Err = HearthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| HearthError::Validation(format!("invalid source id: {s}")))
    }
}

/// Which upstream a source pulls from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Plain ICS/webcal feed fetched over HTTP(S).
    #[default]
    IcsFeed,
    /// Google Calendar events API, authorized through an OAuth account.
    GoogleCalendar,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IcsFeed => "ics_feed",
            Self::GoogleCalendar => "google_calendar",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = HearthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ics_feed" => Ok(Self::IcsFeed),
            "google_calendar" => Ok(Self::GoogleCalendar),
            other => Err(HearthError::Validation(format!("unknown provider: {other}"))),
        }
    }
}

/// One external feed connected to one child profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSource {
    pub id: SourceId,
    pub owner_id: String,
    pub child_id: String,
    pub provider: ProviderKind,
    pub display_name: String,
    pub active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Conditional-fetch validators from the last successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedValidators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl FeedValidators {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// Protected feed location and scheduling cursor, 1:1 with a source.
///
/// Never serialized: the ciphertext and hash stay inside the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCredential {
    pub source_id: SourceId,
    pub encrypted_url: String,
    pub url_hash: String,
    pub masked_url: String,
    /// OAuth account the token provider resolves for Google sources.
    pub oauth_account: Option<String>,
    pub validators: FeedValidators,
    pub refresh_interval_minutes: u32,
    pub next_run_at: DateTime<Utc>,
    pub consecutive_failures: u32,
}

/// A source together with its credential, as loaded from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredSource {
    pub source: CalendarSource,
    pub credential: FeedCredential,
}

impl RegisteredSource {
    pub fn id(&self) -> SourceId {
        self.source.id
    }

    pub fn summary(&self) -> SourceSummary {
        SourceSummary {
            id: self.source.id,
            child_id: self.source.child_id.clone(),
            provider: self.source.provider,
            display_name: self.source.display_name.clone(),
            masked_url: self.credential.masked_url.clone(),
            active: self.source.active,
            last_synced_at: self.source.last_synced_at,
            next_run_at: self.credential.next_run_at,
            refresh_interval_minutes: self.credential.refresh_interval_minutes,
            consecutive_failures: self.credential.consecutive_failures,
        }
    }
}

/// Registration request for a new source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSource {
    pub owner_id: String,
    pub child_id: String,
    pub raw_url: String,
    pub display_name: String,
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub refresh_interval_minutes: Option<u32>,
    #[serde(default)]
    pub oauth_account: Option<String>,
}

/// Display-safe view of a source; carries only the masked URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSummary {
    pub id: SourceId,
    pub child_id: String,
    pub provider: ProviderKind,
    pub display_name: String,
    pub masked_url: String,
    pub active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
    pub refresh_interval_minutes: u32,
    pub consecutive_failures: u32,
}
