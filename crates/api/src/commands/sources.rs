//! Source lifecycle commands

use chrono::{DateTime, Utc};
use hearth_domain::{NewSource, ProviderKind, Result, SourceId, SourceSummary};
use serde::{Deserialize, Serialize};

use crate::utils::command_helpers::execute_command;
use crate::AppContext;

/// Body of a registration request; the owner comes from the caller's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSourceRequest {
    pub raw_url: String,
    pub child_id: String,
    pub display_name: String,
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub refresh_interval_minutes: Option<u32>,
    #[serde(default)]
    pub oauth_account: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSourceResponse {
    pub source_id: SourceId,
    pub masked_url: String,
    pub next_run_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceCredentialRequest {
    pub raw_url: String,
    #[serde(default)]
    pub oauth_account: Option<String>,
}

/// Register a new feed for one of the owner's children.
pub async fn register_source(
    ctx: &AppContext,
    owner_id: &str,
    request: RegisterSourceRequest,
) -> Result<RegisterSourceResponse> {
    execute_command("sources::register_source", || async {
        let registered = ctx
            .registry()
            .register_source(NewSource {
                owner_id: owner_id.to_string(),
                child_id: request.child_id,
                raw_url: request.raw_url,
                display_name: request.display_name,
                provider: request.provider,
                refresh_interval_minutes: request.refresh_interval_minutes,
                oauth_account: request.oauth_account,
            })
            .await?;

        Ok(RegisterSourceResponse {
            source_id: registered.id(),
            masked_url: registered.credential.masked_url,
            next_run_at: registered.credential.next_run_at,
        })
    })
    .await
}

/// The owner's sources, masked URLs only.
pub async fn list_sources(ctx: &AppContext, owner_id: &str) -> Result<Vec<SourceSummary>> {
    execute_command("sources::list_sources", || async {
        ctx.registry().list_sources(owner_id).await
    })
    .await
}

/// Point one of the owner's sources at a new feed URL.
pub async fn replace_credential(
    ctx: &AppContext,
    owner_id: &str,
    source_id: SourceId,
    request: ReplaceCredentialRequest,
) -> Result<SourceSummary> {
    execute_command("sources::replace_credential", || async {
        let registry = ctx.registry();
        registry.get_owned(owner_id, source_id).await?;
        let replaced = registry
            .replace_credential(source_id, &request.raw_url, request.oauth_account)
            .await?;
        Ok(replaced.summary())
    })
    .await
}

/// Stop syncing one of the owner's sources. Its events are kept.
pub async fn deactivate_source(
    ctx: &AppContext,
    owner_id: &str,
    source_id: SourceId,
) -> Result<()> {
    execute_command("sources::deactivate_source", || async {
        let registry = ctx.registry();
        registry.get_owned(owner_id, source_id).await?;
        registry.deactivate_source(source_id).await
    })
    .await
}
