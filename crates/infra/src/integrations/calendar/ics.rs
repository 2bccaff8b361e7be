//! Public iCalendar feed provider (plain `https://` / `webcal://` URLs).

use async_trait::async_trait;
use hearth_core::{FeedProvider, FetchOutcome, FetchRequest};
use hearth_domain::{ParsedEvent, ProviderKind, Result};
use reqwest::header::{ACCEPT, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use reqwest::{Method, StatusCode};
use tracing::{debug, instrument};

use super::{parser, status_error, validators_from_headers};
use crate::http::HttpClient;

const ACCEPT_CALENDAR: &str = "text/calendar, text/plain;q=0.9, */*;q=0.5";

/// Fetches ICS feeds with conditional GET.
#[derive(Debug, Clone)]
pub struct IcsFeedProvider {
    http: HttpClient,
}

impl IcsFeedProvider {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl FeedProvider for IcsFeedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::IcsFeed
    }

    #[instrument(skip(self, request), fields(source_id = %request.source_id))]
    async fn fetch(&self, request: FetchRequest) -> Result<FetchOutcome> {
        let mut builder =
            self.http.request(Method::GET, request.url.expose()).header(ACCEPT, ACCEPT_CALENDAR);

        if let Some(etag) = &request.validators.etag {
            builder = builder.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = &request.validators.last_modified {
            builder = builder.header(IF_MODIFIED_SINCE, last_modified);
        }

        let response = self.http.send(builder).await?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            debug!("feed not modified");
            return Ok(FetchOutcome::NotModified);
        }
        if !status.is_success() {
            return Err(status_error(status));
        }

        let validators = validators_from_headers(response.headers());
        let body = self.http.read_text(response).await?;
        debug!(bytes = body.len(), has_etag = validators.etag.is_some(), "feed fetched");

        Ok(FetchOutcome::Fetched { body, validators })
    }

    fn parse(&self, body: &str) -> Result<Vec<ParsedEvent>> {
        parser::parse_ics(body)
    }
}
