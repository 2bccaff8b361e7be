//! Google Calendar provider implementation
//!
//! The stored feed URL is the calendar's events collection, e.g.
//! `https://www.googleapis.com/calendar/v3/calendars/{calendarId}/events`.
//! Access tokens come from an [`AccessTokenProvider`]; OAuth exchange and
//! refresh happen outside this crate.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use hearth_core::{AccessTokenProvider, FeedProvider, FetchOutcome, FetchRequest};
use hearth_domain::{
    EventContent, EventKey, EventTiming, HearthError, ParsedEvent, ProviderKind, Result,
};
use reqwest::header::{ACCEPT, IF_NONE_MATCH};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{status_error, validators_from_headers};
use crate::http::HttpClient;

const PAGE_SIZE: &str = "2500";
/// Upper bound on pages per fetch so a misbehaving upstream cannot loop forever.
const MAX_PAGES: usize = 20;

/// Google Calendar provider
pub struct GoogleCalendarProvider {
    http: HttpClient,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl GoogleCalendarProvider {
    /// Provider authenticating with tokens from `tokens`.
    pub fn new(http: HttpClient, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self { http, tokens }
    }
}

#[async_trait]
impl FeedProvider for GoogleCalendarProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleCalendar
    }

    #[instrument(skip(self, request), fields(source_id = %request.source_id))]
    async fn fetch(&self, request: FetchRequest) -> Result<FetchOutcome> {
        let account = request.oauth_account.as_deref().ok_or_else(|| {
            HearthError::Configuration("google calendar source has no linked account".into())
        })?;
        let access_token = self.tokens.access_token(account).await?;

        let mut items = Vec::new();
        let mut validators = None;
        let mut page_token: Option<String> = None;

        for page in 0..MAX_PAGES {
            let mut query = vec![("singleEvents", "true"), ("maxResults", PAGE_SIZE)];
            if let Some(next) = page_token.as_deref() {
                query.push(("pageToken", next));
            }

            let mut builder = self
                .http
                .request(Method::GET, request.url.expose())
                .bearer_auth(access_token.expose())
                .header(ACCEPT, "application/json")
                .query(&query);

            // Only the first page is conditional; later pages belong to the same snapshot.
            if page == 0 {
                if let Some(etag) = &request.validators.etag {
                    builder = builder.header(IF_NONE_MATCH, etag);
                }
            }

            let response = self.http.send(builder).await?;
            let status = response.status();

            if page == 0 && status == StatusCode::NOT_MODIFIED {
                debug!("google calendar not modified");
                return Ok(FetchOutcome::NotModified);
            }
            if !status.is_success() {
                return Err(status_error(status));
            }

            if validators.is_none() {
                validators = Some(validators_from_headers(response.headers()));
            }

            let body = self.http.read_text(response).await?;
            let page: GoogleEventsPage = serde_json::from_str(&body).map_err(|err| {
                HearthError::Parse(format!("failed to parse Google events page: {err}"))
            })?;

            items.extend(page.items);
            page_token = page.next_page_token.filter(|t| !t.is_empty());
            if page_token.is_none() {
                break;
            }
        }

        if page_token.is_some() {
            warn!(max_pages = MAX_PAGES, "google calendar paging truncated");
            return Err(HearthError::Transport(format!(
                "google calendar returned more than {MAX_PAGES} pages"
            )));
        }

        let body = serde_json::to_string(&GoogleEventsBody { items }).map_err(|err| {
            HearthError::Internal(format!("failed to buffer Google events: {err}"))
        })?;

        Ok(FetchOutcome::Fetched { body, validators: validators.unwrap_or_default() })
    }

    fn parse(&self, body: &str) -> Result<Vec<ParsedEvent>> {
        let body: GoogleEventsBody<GoogleEvent> = serde_json::from_str(body)
            .map_err(|err| HearthError::Parse(format!("malformed Google events body: {err}")))?;

        Ok(body.items.into_iter().filter_map(into_parsed_event).collect())
    }
}

fn into_parsed_event(event: GoogleEvent) -> Option<ParsedEvent> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }

    let uid = event.ical_uid.clone().unwrap_or_else(|| event.id.clone());
    let Some(start) = event.start.as_ref().and_then(to_moment) else {
        warn!(event_id = %event.id, "skipping Google event without a readable start");
        return None;
    };
    let end = event.end.as_ref().and_then(to_moment);

    let timing = match (start, end) {
        (Moment::Date(start), Some(Moment::Date(end))) if end > start => {
            EventTiming::AllDay { start, end }
        }
        (Moment::Date(start), _) => {
            EventTiming::AllDay { start, end: start + chrono::Duration::days(1) }
        }
        (Moment::Instant(start), Some(Moment::Instant(end))) => {
            EventTiming::Timed { start, end: end.max(start) }
        }
        (Moment::Instant(start), _) => EventTiming::Timed { start, end: start },
    };

    let recurrence_id = event.original_start_time.as_ref().and_then(to_moment).map(|m| match m {
        Moment::Date(date) => date.format("%Y-%m-%d").to_string(),
        Moment::Instant(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
    });

    Some(ParsedEvent {
        key: EventKey::new(uid, recurrence_id),
        content: EventContent {
            title: event
                .summary
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "(No title)".to_string()),
            timing,
            location: event.location.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        },
    })
}

enum Moment {
    Date(NaiveDate),
    Instant(DateTime<Utc>),
}

fn to_moment(value: &EventDateTime) -> Option<Moment> {
    if let Some(date_time) = &value.date_time {
        return DateTime::parse_from_rfc3339(date_time)
            .ok()
            .map(|dt| Moment::Instant(dt.with_timezone(&Utc)));
    }
    value
        .date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .map(Moment::Date)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventsPage {
    #[serde(default)]
    items: Vec<serde_json::Value>,
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
struct GoogleEventsBody<T = serde_json::Value> {
    #[serde(default)]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    id: String,
    #[serde(rename = "iCalUID")]
    ical_uid: Option<String>,
    status: Option<String>,
    summary: Option<String>,
    location: Option<String>,
    start: Option<EventDateTime>,
    end: Option<EventDateTime>,
    original_start_time: Option<EventDateTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    date_time: Option<String>,
    date: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn provider() -> GoogleCalendarProvider {
        struct NoTokens;

        #[async_trait]
        impl AccessTokenProvider for NoTokens {
            async fn access_token(&self, _account: &str) -> Result<hearth_common::SecureString> {
                Err(HearthError::Unauthorized("no tokens in unit tests".into()))
            }
        }

        GoogleCalendarProvider::new(HttpClient::new().unwrap(), Arc::new(NoTokens))
    }

    #[test]
    fn parses_timed_all_day_and_instance_events() {
        let body = r#"{"items":[
            {"id":"a","iCalUID":"a@google.com","summary":"Dentist","location":" Clinic ",
             "start":{"dateTime":"2024-01-05T10:00:00-05:00"},
             "end":{"dateTime":"2024-01-05T11:00:00-05:00"}},
            {"id":"b","summary":"Camp","start":{"date":"2024-07-01"},"end":{"date":"2024-07-06"}},
            {"id":"c_20240113T150000Z","iCalUID":"c@google.com","summary":"Soccer",
             "start":{"dateTime":"2024-01-13T15:00:00Z"},"end":{"dateTime":"2024-01-13T16:00:00Z"},
             "originalStartTime":{"dateTime":"2024-01-13T15:00:00Z"}}
        ]}"#;

        let events = provider().parse(body).expect("parse");
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].key, EventKey::new("a@google.com", None));
        assert_eq!(events[0].content.location.as_deref(), Some("Clinic"));
        assert_eq!(
            events[0].content.timing,
            EventTiming::Timed {
                start: Utc.with_ymd_and_hms(2024, 1, 5, 15, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2024, 1, 5, 16, 0, 0).unwrap(),
            }
        );

        assert_eq!(events[1].key, EventKey::new("b", None));
        assert!(matches!(events[1].content.timing, EventTiming::AllDay { .. }));

        assert_eq!(
            events[2].key,
            EventKey::new("c@google.com", Some("2024-01-13T15:00:00Z".to_string()))
        );
    }

    #[test]
    fn cancelled_events_are_skipped() {
        let body = r#"{"items":[{"id":"x","status":"cancelled"}]}"#;
        assert!(provider().parse(body).expect("parse").is_empty());
    }

    #[test]
    fn malformed_body_is_parse_error() {
        assert!(matches!(provider().parse("not json"), Err(HearthError::Parse(_))));
    }
}
