//! Manual and batch sync commands

use hearth_core::calendar::redact_owner;
use hearth_domain::{HearthError, Result, SourceId, SweepReport};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::utils::command_helpers::execute_command;
use crate::AppContext;

/// Mutation counts of a manual sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualSyncResponse {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub candidates_found: usize,
    pub not_modified: bool,
}

/// User-triggered sync of one source.
///
/// A failed run is returned as its first recorded error, so the caller can
/// tell an unreachable feed from a malformed one.
pub async fn sync_source(
    ctx: &AppContext,
    owner_id: &str,
    source_id: SourceId,
) -> Result<ManualSyncResponse> {
    execute_command("sync::sync_source", || async {
        let result = ctx.orchestrator.sync_manual(owner_id, source_id).await?;
        if let Some(first) = result.errors.into_iter().next() {
            warn!(
                owner = %redact_owner(owner_id),
                source_id = %source_id,
                phase = first.phase.as_str(),
                error_code = %first.code,
                "manual sync failed"
            );
            return Err(first.error);
        }

        Ok(ManualSyncResponse {
            created: result.created,
            updated: result.updated,
            deleted: result.deleted,
            candidates_found: result.candidates_found,
            not_modified: result.not_modified,
        })
    })
    .await
}

/// Batch sweep of every due source, for the trusted scheduler only.
///
/// `presented_secret` is compared in constant time. Without a configured
/// secret every call is refused with a configuration error.
pub async fn sync_due(ctx: &AppContext, presented_secret: Option<&str>) -> Result<SweepReport> {
    execute_command("sync::sync_due", || async {
        let secret = ctx.scheduler_secret()?;
        match presented_secret {
            Some(candidate) if secret.constant_time_eq(candidate) => {}
            _ => return Err(HearthError::Unauthorized("invalid scheduler secret".to_string())),
        }
        ctx.orchestrator.sync_due().await
    })
    .await
}
