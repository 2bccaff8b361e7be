//! Error types used throughout the workspace

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Hearth calendar ingestion
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum HearthError {
    /// Missing or malformed key material, scheduler secret, or settings.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed or unsupported input, rejected before any side effect.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate source: {0}")]
    DuplicateSource(String),

    /// Fetch timeout, connection failure, or non-success upstream status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Upstream answered but refused the feed (gone, not found, forbidden).
    #[error("Upstream rejected feed: {0}")]
    UpstreamRejected(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Source inactive: {0}")]
    Inactive(String),

    #[error("Sync already in progress: {0}")]
    SyncInProgress(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HearthError {
    /// Stable machine-readable code used by entry points and log labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::Validation(_) => "invalid_url",
            Self::DuplicateSource(_) => "duplicate_source",
            Self::Transport(_) => "feed_unreachable",
            Self::UpstreamRejected(_) => "feed_rejected",
            Self::Parse(_) => "feed_malformed",
            Self::RateLimited { .. } => "rate_limited",
            Self::NotFound(_) => "not_found",
            Self::Inactive(_) => "source_inactive",
            Self::SyncInProgress(_) => "sync_in_progress",
            Self::Unauthorized(_) => "unauthorized",
            Self::Decryption(_) => "decryption_failed",
            Self::Database(_) => "database_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Retry-after hint in seconds for rate-limit rejections.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Failures caused by the upstream feed rather than by this process.
    ///
    /// These are retried at the source's normal cadence.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::UpstreamRejected(_) | Self::Parse(_))
    }
}

/// Result type alias for Hearth operations
pub type Result<T> = std::result::Result<T, HearthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_distinguish_user_facing_failures() {
        let codes = [
            HearthError::RateLimited { retry_after_secs: 10 }.code(),
            HearthError::Transport("timeout".into()).code(),
            HearthError::Parse("bad".into()).code(),
            HearthError::Validation("scheme".into()).code(),
            HearthError::DuplicateSource("dup".into()).code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn serializes_adjacently_tagged() {
        let json = serde_json::to_value(HearthError::RateLimited { retry_after_secs: 42 })
            .expect("serialize");
        assert_eq!(json["type"], "RateLimited");
        assert_eq!(json["message"]["retry_after_secs"], 42);

        let json = serde_json::to_value(HearthError::Parse("no VCALENDAR".into()))
            .expect("serialize");
        assert_eq!(json["type"], "Parse");
        assert_eq!(json["message"], "no VCALENDAR");
    }

    #[test]
    fn retry_after_only_for_rate_limit() {
        assert_eq!(HearthError::RateLimited { retry_after_secs: 7 }.retry_after_secs(), Some(7));
        assert_eq!(HearthError::Transport("x".into()).retry_after_secs(), None);
    }
}
