//! Calendar ingestion: source lifecycle and sync engine

pub mod in_flight;
pub mod orchestrator;
pub mod ports;
pub mod rate_limiter;
pub mod reconciler;
pub mod registry;
pub mod vault;

use sha2::{Digest, Sha256};

pub use in_flight::{InFlightSources, InFlightTicket};
pub use orchestrator::{OrchestratorSettings, SyncOrchestrator};
pub use rate_limiter::ManualSyncLimiter;
pub use reconciler::{content_hash, reconcile};
pub use registry::SourceRegistry;
pub use vault::{mask, normalize, CredentialVault};

/// Short salted hash of an owner id for log fields.
pub fn redact_owner(owner_id: &str) -> String {
    const OWNER_HASH_SALT: &[u8] = b"hearth-calendar-owner-salt";
    let mut hasher = Sha256::new();
    hasher.update(OWNER_HASH_SALT);
    hasher.update(owner_id.as_bytes());
    let digest = hasher.finalize();
    format!("owner_hash={}", hex::encode(&digest[..8]))
}
