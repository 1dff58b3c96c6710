//! Sync configuration handlers
//!
//! POST /sync/create, POST /sync/run/{id}, GET /sync/{id}/logs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sea_orm::EntityTrait;
use tracing::{info, warn};

use crate::AppState;
use crate::entities::prelude::Syncs;
use crate::handlers::{error_response, status_for};
use crate::models::common::ErrorResponse;
use crate::models::sync::{CreateSyncRequest, CreateSyncResponse, RunOutcome};
use crate::models::sync_log::{LOGS_PER_PAGE, LogsPageResponse, LogsQuery};
use crate::services::error::SyncError;

/// POST /sync/create
///
/// # Response
/// - 201: Created, with the new id
/// - 400: Invalid mapping, filters, frequency or direction
/// - 403: Plan sync limit reached
/// - 404: Unknown user
pub async fn create_sync(
    State(state): State<AppState>,
    Json(request): Json<CreateSyncRequest>,
) -> Result<(StatusCode, Json<CreateSyncResponse>), (StatusCode, Json<ErrorResponse>)> {
    let sync = state.sync_store.create(request).await.map_err(error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSyncResponse {
            id: sync.id,
            message: "Sync created successfully".to_string(),
        }),
    ))
}

/// POST /sync/run/{id}
///
/// Runs the configuration now and reports the outcome. Failures carry the
/// same `{status, message}` body with a status code matching the error.
pub async fn run_sync(State(state): State<AppState>, Path(sync_id): Path<i32>) -> (StatusCode, Json<RunOutcome>) {
    info!(sync_id = sync_id, "Manual sync requested");

    match state.engine.run_sync(sync_id).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)),
        Err(e) => {
            warn!(sync_id = sync_id, error = %e, "Manual sync failed");
            (status_for(&e), Json(RunOutcome::error(&e)))
        }
    }
}

/// GET /sync/{id}/logs?page=N
///
/// Newest entries first, 20 per page.
pub async fn get_sync_logs(
    State(state): State<AppState>,
    Path(sync_id): Path<i32>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsPageResponse>, (StatusCode, Json<ErrorResponse>)> {
    let exists = Syncs::find_by_id(sync_id)
        .one(&state.db)
        .await
        .map_err(|e| error_response(e.into()))?
        .is_some();
    if !exists {
        return Err(error_response(SyncError::NotFound(format!("Sync {} not found", sync_id))));
    }

    let page = state
        .sync_logs
        .list_logs(sync_id, query.page, LOGS_PER_PAGE)
        .await
        .map_err(error_response)?;
    Ok(Json(page))
}
