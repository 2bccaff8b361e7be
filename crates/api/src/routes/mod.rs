//! HTTP routes over the command layer
//!
//! The caller's identity arrives in the `x-user-id` header, set by the
//! authenticating proxy in front of this service. Batch triggers present the
//! shared scheduler secret in `x-scheduler-secret`.

pub mod sources;
pub mod sync;

use std::sync::Arc;

use axum::extract::{FromRequestParts, State};
use axum::http::header::RETRY_AFTER;
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use hearth_domain::{HearthError, SourceId};
use hearth_infra::InfraError;
use serde::Serialize;
use tracing::error;

use crate::AppContext;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const SCHEDULER_SECRET_HEADER: &str = "x-scheduler-secret";

/// Build the application router.
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(sources::router())
        .merge(sync::router())
        .with_state(ctx)
}

/// Standard API error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

/// Converts domain errors into HTTP responses
#[derive(Debug)]
pub struct ApiError(pub HearthError);

impl From<HearthError> for ApiError {
    fn from(err: HearthError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = if status.is_server_error() && !self.0.is_upstream() {
            error!(error_code = self.0.code(), error = %self.0, "request failed");
            "internal error".to_string()
        } else {
            self.0.to_string()
        };

        let body = Json(ErrorResponse { code: self.0.code(), message });
        let mut response = (status, body).into_response();
        if let Some(secs) = self.0.retry_after_secs() {
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

pub fn status_for(err: &HearthError) -> StatusCode {
    match err {
        HearthError::Validation(_) => StatusCode::BAD_REQUEST,
        HearthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        HearthError::NotFound(_) => StatusCode::NOT_FOUND,
        HearthError::DuplicateSource(_)
        | HearthError::Inactive(_)
        | HearthError::SyncInProgress(_) => StatusCode::CONFLICT,
        HearthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        HearthError::Transport(_) | HearthError::UpstreamRejected(_) | HearthError::Parse(_) => {
            StatusCode::BAD_GATEWAY
        }
        HearthError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        HearthError::Decryption(_) | HearthError::Database(_) | HearthError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Authenticated caller, taken from [`USER_ID_HEADER`].
#[derive(Debug, Clone)]
pub struct Owner(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Owner(value.to_string()))
            .ok_or_else(|| ApiError(HearthError::Unauthorized(format!("missing {USER_ID_HEADER}"))))
    }
}

pub(crate) fn parse_source_id(raw: &str) -> Result<SourceId, ApiError> {
    raw.parse::<SourceId>().map_err(ApiError)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    scheduler_running: bool,
}

/// GET /health - database reachability and scheduler state
async fn health(State(ctx): State<Arc<AppContext>>) -> Result<Json<HealthResponse>, ApiError> {
    let db = Arc::clone(&ctx.db);
    tokio::task::spawn_blocking(move || db.health_check())
        .await
        .map_err(|err| HearthError::from(InfraError::from(err)))??;
    Ok(Json(HealthResponse { status: "ok", scheduler_running: ctx.scheduler_running().await }))
}
