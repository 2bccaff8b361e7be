//! Shared test helpers for `hearth-core` integration tests.
//!
//! In-memory ports plus a fake upstream so the sync engine can be driven end
//! to end without a database or network.

#![allow(dead_code)]

pub mod repositories;
pub mod upstream;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use hearth_core::{
    CredentialVault, FeedProviders, ManualClock, OrchestratorSettings, SourceRegistry,
    SyncOrchestrator,
};
use hearth_domain::{
    EventContent, EventKey, EventTiming, NewSource, ParsedEvent, ProviderKind, RegisteredSource,
    SyncConfig,
};

pub use repositories::{MemoryEventRepository, MemorySourceRepository};
pub use upstream::{FakeUpstream, FeedMode};

pub const OWNER: &str = "parent-1";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
}

/// Fully wired registry and orchestrator over in-memory adapters.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub sources: Arc<MemorySourceRepository>,
    pub events: Arc<MemoryEventRepository>,
    pub upstream: Arc<FakeUpstream>,
    pub registry: Arc<SourceRegistry>,
    pub orchestrator: Arc<SyncOrchestrator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default(), |_| {})
    }

    pub fn with_config(config: SyncConfig, tweak: impl FnOnce(&mut OrchestratorSettings)) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let sources = Arc::new(MemorySourceRepository::default());
        let events = Arc::new(MemoryEventRepository::default());
        let upstream = Arc::new(FakeUpstream::new(ProviderKind::IcsFeed));
        let vault = Arc::new(CredentialVault::new(vec![42u8; 32]).unwrap());

        let registry = Arc::new(SourceRegistry::new(
            sources.clone(),
            vault.clone(),
            clock.clone(),
            &config,
        ));

        let mut settings = OrchestratorSettings::from(&config);
        settings.fetch_timeout = Duration::from_secs(2);
        tweak(&mut settings);

        let orchestrator = Arc::new(SyncOrchestrator::new(
            registry.clone(),
            events.clone(),
            FeedProviders::new().with(upstream.clone()),
            vault,
            clock.clone(),
            settings,
        ));

        Self { clock, sources, events, upstream, registry, orchestrator }
    }

    pub async fn register(&self, child_id: &str, raw_url: &str) -> RegisteredSource {
        self.registry.register_source(new_source(child_id, raw_url)).await.unwrap()
    }
}

pub fn new_source(child_id: &str, raw_url: &str) -> NewSource {
    NewSource {
        owner_id: OWNER.to_string(),
        child_id: child_id.to_string(),
        raw_url: raw_url.to_string(),
        display_name: "School calendar".to_string(),
        provider: ProviderKind::IcsFeed,
        refresh_interval_minutes: None,
        oauth_account: None,
    }
}

/// All-day event on `day` of January 2024.
pub fn event(uid: &str, title: &str, day: u32, location: Option<&str>) -> ParsedEvent {
    let start = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
    ParsedEvent {
        key: EventKey::new(uid, None),
        content: EventContent {
            title: title.to_string(),
            timing: EventTiming::AllDay { start, end: start.succ_opt().unwrap() },
            location: location.map(str::to_string),
        },
    }
}
