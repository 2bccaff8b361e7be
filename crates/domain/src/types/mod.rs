//! Domain types and models
//!
//! Calendar sources and their credentials, events derived from feeds, and
//! the ephemeral results of sync runs.

pub mod event;
pub mod source;
pub mod sync;

pub use event::{CalendarEvent, EventChangeSet, EventContent, EventKey, EventTiming, ParsedEvent};
pub use source::{
    CalendarSource, FeedCredential, FeedValidators, NewSource, ProviderKind, RegisteredSource,
    SourceId, SourceSummary,
};
pub use sync::{SweepReport, SyncErrorDescriptor, SyncOutcome, SyncPhase, SyncResult};
