//! Shared fixtures for the api integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use hearth_api::{router, AppContext};
use hearth_domain::Config;
use hearth_infra::KeyManager;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const OWNER: &str = "parent-1";
pub const SECRET: &str = "sweep-secret-value";

/// Application wired against a temporary database.
pub struct TestApp {
    pub ctx: Arc<AppContext>,
    pub router: Router,
    _temp_dir: TempDir,
}

impl TestApp {
    /// Build an app whose key variables are namespaced by `name`.
    ///
    /// The scheduler trigger is off; the scheduler secret is set only when
    /// `with_secret` is true.
    pub async fn new(name: &str, with_secret: bool) -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let config = test_config(name, &temp_dir);

        std::env::set_var(&config.vault.key_env_var, KeyManager::generate_key());
        if with_secret {
            std::env::set_var(&config.scheduler.secret_env_var, SECRET);
        } else {
            std::env::remove_var(&config.scheduler.secret_env_var);
        }

        let ctx = Arc::new(AppContext::new(config).await.expect("context builds"));
        let router = router(Arc::clone(&ctx));
        Self { ctx, router, _temp_dir: temp_dir }
    }
}

pub fn test_config(name: &str, temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    let suffix = name.to_uppercase().replace('-', "_");
    config.database.path = temp_dir.path().join("hearth.db").to_string_lossy().to_string();
    config.database.pool_size = 4;
    config.vault.key_env_var = format!("HEARTH_TEST_KEY_{suffix}");
    config.scheduler.enabled = false;
    config.scheduler.secret_env_var = format!("HEARTH_TEST_SECRET_{suffix}");
    config
}

/// Serve a two-event ICS feed at `/family.ics`.
pub async fn serve_family_feed(server: &MockServer) {
    let body = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Hearth Test//EN\r\n\
        BEGIN:VEVENT\r\nUID:pickup-1\r\nSUMMARY:Pickup\r\nDTSTART;VALUE=DATE:20240105\r\n\
        LOCATION:School\r\nEND:VEVENT\r\n\
        BEGIN:VEVENT\r\nUID:dentist-1\r\nSUMMARY:Dentist\r\nDTSTART:20240110T150000Z\r\n\
        DTEND:20240110T160000Z\r\nEND:VEVENT\r\n\
        END:VCALENDAR\r\n";
    Mock::given(method("GET"))
        .and(path("/family.ics"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("ETag", "\"v1\"").set_body_string(body),
        )
        .mount(server)
        .await;
}

/// Serve a body that is not a calendar at `/broken.ics`.
pub async fn serve_broken_feed(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/broken.ics"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login required</html>"))
        .mount(server)
        .await;
}
