//! Sync endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use hearth_domain::SweepReport;

use super::{parse_source_id, ApiError, Owner, SCHEDULER_SECRET_HEADER};
use crate::commands::{self, ManualSyncResponse};
use crate::AppContext;

pub fn router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/sources/{id}/sync", post(sync_source))
        .route("/internal/sync-due", post(sync_due))
}

/// POST /sources/{id}/sync - manual sync of one source
async fn sync_source(
    State(ctx): State<Arc<AppContext>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
) -> Result<Json<ManualSyncResponse>, ApiError> {
    let source_id = parse_source_id(&id)?;
    Ok(Json(commands::sync_source(&ctx, &owner_id, source_id).await?))
}

/// POST /internal/sync-due - batch sweep, scheduler only
async fn sync_due(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Json<SweepReport>, ApiError> {
    let presented = headers.get(SCHEDULER_SECRET_HEADER).and_then(|value| value.to_str().ok());
    Ok(Json(commands::sync_due(&ctx, presented).await?))
}
