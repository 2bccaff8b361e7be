#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use hearth_domain::{
    CalendarSource, FeedCredential, FeedValidators, ProviderKind, RegisteredSource, SourceId,
};
use hearth_infra::database::DbManager;
use tempfile::TempDir;

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let manager = DbManager::new(temp_dir.path().join("hearth-test.db"), 4)
            .expect("db manager should be created");
        manager.run_migrations().expect("schema migrations should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).single().expect("valid timestamp")
}

/// Build a registered source with deterministic bookkeeping.
pub fn registered_source(
    owner_id: &str,
    child_id: &str,
    url_hash: &str,
    next_run_at: DateTime<Utc>,
) -> RegisteredSource {
    let id = SourceId::new();
    RegisteredSource {
        source: CalendarSource {
            id,
            owner_id: owner_id.to_string(),
            child_id: child_id.to_string(),
            provider: ProviderKind::IcsFeed,
            display_name: format!("{child_id} school"),
            active: true,
            last_synced_at: None,
            created_at: t0(),
        },
        credential: FeedCredential {
            source_id: id,
            encrypted_url: format!("v1.test.{url_hash}.cipher"),
            url_hash: url_hash.to_string(),
            masked_url: "https://calendar.example.com/***".to_string(),
            oauth_account: None,
            validators: FeedValidators::default(),
            refresh_interval_minutes: 30,
            next_run_at,
            consecutive_failures: 0,
        },
    }
}

pub fn ics_calendar(events: &[(&str, &str, &str, Option<&str>)]) -> String {
    let mut body = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Hearth Test//EN\r\n");
    for (uid, title, date, location) in events {
        body.push_str("BEGIN:VEVENT\r\n");
        body.push_str(&format!("UID:{uid}\r\nSUMMARY:{title}\r\nDTSTART;VALUE=DATE:{date}\r\n"));
        if let Some(location) = location {
            body.push_str(&format!("LOCATION:{location}\r\n"));
        }
        body.push_str("END:VEVENT\r\n");
    }
    body.push_str("END:VCALENDAR\r\n");
    body
}
