//! Calendar feed providers
//!
//! Each provider implements the `FeedProvider` port: a conditional fetch
//! that yields a body plus validators, and a parser that turns that body into
//! parsed events. The sync engine never sees provider-specific shapes.

pub mod google;
pub mod ics;
pub mod parser;

pub use google::GoogleCalendarProvider;
pub use ics::IcsFeedProvider;
pub use parser::parse_ics;

use hearth_domain::{FeedValidators, HearthError};
use reqwest::header::{HeaderMap, ETAG, LAST_MODIFIED};
use reqwest::StatusCode;

/// Map a non-success upstream status onto the error taxonomy.
///
/// Statuses that mean the feed is gone or no longer readable count toward
/// automatic deactivation; everything else is a transient transport failure.
pub(crate) fn status_error(status: StatusCode) -> HearthError {
    let message =
        format!("HTTP {} {}", status.as_u16(), status.canonical_reason().unwrap_or("unknown"));
    match status {
        StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::NOT_FOUND
        | StatusCode::GONE => HearthError::UpstreamRejected(message),
        _ => HearthError::Transport(message),
    }
}

pub(crate) fn validators_from_headers(headers: &HeaderMap) -> FeedValidators {
    let header = |name| {
        headers
            .get(name)
            .and_then(|value: &reqwest::header::HeaderValue| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    FeedValidators { etag: header(ETAG), last_modified: header(LAST_MODIFIED) }
}
