//! Source lifecycle endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post, put};
use axum::{Json, Router};
use hearth_domain::SourceSummary;

use super::{parse_source_id, ApiError, Owner};
use crate::commands::{
    self, RegisterSourceRequest, RegisterSourceResponse, ReplaceCredentialRequest,
};
use crate::AppContext;

pub fn router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/sources", post(register_source).get(list_sources))
        .route("/sources/{id}", delete(deactivate_source))
        .route("/sources/{id}/credential", put(replace_credential))
}

/// POST /sources - register a feed
async fn register_source(
    State(ctx): State<Arc<AppContext>>,
    Owner(owner_id): Owner,
    Json(request): Json<RegisterSourceRequest>,
) -> Result<(StatusCode, Json<RegisterSourceResponse>), ApiError> {
    let created = commands::register_source(&ctx, &owner_id, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /sources - list the caller's sources
async fn list_sources(
    State(ctx): State<Arc<AppContext>>,
    Owner(owner_id): Owner,
) -> Result<Json<Vec<SourceSummary>>, ApiError> {
    Ok(Json(commands::list_sources(&ctx, &owner_id).await?))
}

/// PUT /sources/{id}/credential - replace the feed URL
async fn replace_credential(
    State(ctx): State<Arc<AppContext>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
    Json(request): Json<ReplaceCredentialRequest>,
) -> Result<Json<SourceSummary>, ApiError> {
    let source_id = parse_source_id(&id)?;
    Ok(Json(commands::replace_credential(&ctx, &owner_id, source_id, request).await?))
}

/// DELETE /sources/{id} - deactivate
async fn deactivate_source(
    State(ctx): State<Arc<AppContext>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let source_id = parse_source_id(&id)?;
    commands::deactivate_source(&ctx, &owner_id, source_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
