//! # Hearth Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - SQLite repositories for sources, credentials, and events
//! - The HTTP client and the ICS / Google Calendar feed providers
//! - The cron-driven feed sweep scheduler
//! - Configuration and secret loading
//!
//! ## Architecture
//! - Implements traits defined in `hearth-core`
//! - Contains all "impure" code (I/O, network, filesystem)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod key_manager;
pub mod scheduling;

// Re-export commonly used items
pub use database::{DbManager, SqliteEventRepository, SqliteSourceRepository};
pub use errors::InfraError;
pub use http::HttpClient;
pub use integrations::calendar::{GoogleCalendarProvider, IcsFeedProvider};
pub use key_manager::KeyManager;
pub use scheduling::{FeedSchedulerConfig, FeedSyncScheduler, SchedulerError};
