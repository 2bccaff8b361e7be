use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hearth_core::{FeedProvider, FetchOutcome, FetchRequest};
use hearth_domain::{
    FeedValidators, HearthError, ParsedEvent, ProviderKind, Result as DomainResult,
};
use tokio::sync::Notify;

/// How the fake upstream answers for one feed URL.
#[derive(Clone)]
pub enum FeedMode {
    Serve,
    /// Answer 200 with a body the parser rejects.
    Malformed,
    Fail(HearthError),
    /// Never answer within any sane timeout.
    Hang,
    /// Wait until the notify fires, then serve.
    Block(Arc<Notify>),
}

struct Feed {
    events: Vec<ParsedEvent>,
    version: u64,
    mode: FeedMode,
}

/// Fake feed host keyed by normalized URL, with ETag support.
pub struct FakeUpstream {
    kind: ProviderKind,
    feeds: Mutex<HashMap<String, Feed>>,
    bodies: Mutex<HashMap<String, Vec<ParsedEvent>>>,
    requests: Mutex<Vec<(String, FeedValidators)>>,
}

const MALFORMED_BODY: &str = "<html>not a calendar</html>";

impl FakeUpstream {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            feeds: Mutex::new(HashMap::new()),
            bodies: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Publish a new version of the feed at `url` (normalized form).
    pub fn publish(&self, url: &str, events: Vec<ParsedEvent>) {
        let mut feeds = self.feeds.lock().unwrap();
        let feed = feeds.entry(url.to_string()).or_insert(Feed {
            events: Vec::new(),
            version: 0,
            mode: FeedMode::Serve,
        });
        feed.events = events;
        feed.version += 1;
    }

    pub fn set_mode(&self, url: &str, mode: FeedMode) {
        if let Some(feed) = self.feeds.lock().unwrap().get_mut(url) {
            feed.mode = mode;
        }
    }

    /// URLs fetched so far, in order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn last_validators(&self) -> Option<FeedValidators> {
        self.requests.lock().unwrap().last().map(|(_, v)| v.clone())
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl FeedProvider for FakeUpstream {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn fetch(&self, request: FetchRequest) -> DomainResult<FetchOutcome> {
        let url = request.url.expose().to_string();
        self.requests.lock().unwrap().push((url.clone(), request.validators.clone()));

        let mode = self
            .feeds
            .lock()
            .unwrap()
            .get(&url)
            .map(|feed| feed.mode.clone())
            .ok_or_else(|| HearthError::UpstreamRejected("404 Not Found".to_string()))?;

        match mode {
            FeedMode::Fail(err) => return Err(err),
            FeedMode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            FeedMode::Block(notify) => notify.notified().await,
            FeedMode::Serve | FeedMode::Malformed => {}
        }

        let feeds = self.feeds.lock().unwrap();
        let feed = feeds.get(&url).expect("feed published");
        let etag = format!("\"v{}\"", feed.version);
        if request.validators.etag.as_deref() == Some(etag.as_str()) {
            return Ok(FetchOutcome::NotModified);
        }

        let body = match feed.mode {
            FeedMode::Malformed => MALFORMED_BODY.to_string(),
            _ => format!("{url}#v{}", feed.version),
        };
        self.bodies.lock().unwrap().insert(body.clone(), feed.events.clone());

        Ok(FetchOutcome::Fetched {
            body,
            validators: FeedValidators {
                etag: Some(etag),
                last_modified: Some("Mon, 01 Jan 2024 08:00:00 GMT".to_string()),
            },
        })
    }

    fn parse(&self, body: &str) -> DomainResult<Vec<ParsedEvent>> {
        if body == MALFORMED_BODY {
            return Err(HearthError::Parse("payload is not a VCALENDAR".to_string()));
        }
        self.bodies
            .lock()
            .unwrap()
            .get(body)
            .cloned()
            .ok_or_else(|| HearthError::Parse("unknown body".to_string()))
    }
}
