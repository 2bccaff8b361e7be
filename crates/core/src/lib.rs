//! # Hearth Core
//!
//! Calendar ingestion business logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for storage and feed providers
//! - The credential vault, reconciler, rate limiter, and in-flight guard
//! - The source registry and sync orchestrator services
//!
//! ## Architecture Principles
//! - Only depends on `hearth-common` and `hearth-domain`
//! - No database, HTTP, or parsing code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod calendar;
pub mod clock;

pub use calendar::ports::{
    AccessTokenProvider, CredentialUpdate, EventRepository, FeedProvider, FeedProviders,
    FetchOutcome, FetchRequest, OutcomeUpdate, SourceRepository,
};
pub use calendar::{
    CredentialVault, ManualSyncLimiter, OrchestratorSettings, SourceRegistry, SyncOrchestrator,
};
pub use clock::{Clock, ManualClock, SystemClock};
