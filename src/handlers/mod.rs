pub mod auth;
pub mod health;
pub mod sync;

use axum::{Json, http::StatusCode};
use tracing::error;

use crate::models::common::ErrorResponse;
use crate::services::error::SyncError;

/// HTTP status a failed operation surfaces as
pub fn status_for(err: &SyncError) -> StatusCode {
    match err {
        SyncError::NotFound(_) => StatusCode::NOT_FOUND,
        SyncError::AlreadyRunning(_) => StatusCode::CONFLICT,
        SyncError::Validation(_) => StatusCode::BAD_REQUEST,
        SyncError::Auth(_) => StatusCode::UNAUTHORIZED,
        SyncError::PlanLimit(_) => StatusCode::FORBIDDEN,
        SyncError::Transport(_) | SyncError::Rejected { .. } => StatusCode::BAD_GATEWAY,
        SyncError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(err: SyncError) -> (StatusCode, Json<ErrorResponse>) {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(error = %err, "Request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: Some(err.kind().to_uppercase()),
        }),
    )
}
