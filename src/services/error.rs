//! Error taxonomy for the sync engine and its collaborators

use serde_json::json;

/// Errors surfaced by a sync run or by the clients it drives.
///
/// Only `Transport` is retried. Everything else aborts the run on first
/// occurrence. Single-field extraction failures never show up here; the
/// transformer recovers them locally.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Network failure, 429 or 5xx from Notion/Sheets
    Transport(String),
    /// Expired/invalid token, or the owner never connected the account
    Auth(String),
    /// Malformed configuration
    Validation(String),
    /// Remote service refused the request (non-retryable 4xx)
    Rejected { status: u16, message: String },
    NotFound(String),
    /// Another run for the same configuration is in flight
    AlreadyRunning(i32),
    /// User's plan does not allow another sync
    PlanLimit(String),
    Database(String),
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Transport(_) => "transport",
            SyncError::Auth(_) => "auth",
            SyncError::Validation(_) => "validation",
            SyncError::Rejected { .. } => "rejected",
            SyncError::NotFound(_) => "not_found",
            SyncError::AlreadyRunning(_) => "already_running",
            SyncError::PlanLimit(_) => "plan_limit",
            SyncError::Database(_) => "database",
        }
    }

    /// Structured detail stored alongside `error` run log entries
    pub fn detail(&self) -> serde_json::Value {
        json!({
            "kind": self.kind(),
            "retryable": self.is_retryable(),
            "message": self.to_string(),
        })
    }

    /// Classify a non-success HTTP response from Notion or Sheets
    pub fn from_status(service: &str, status: reqwest::StatusCode, body: String) -> Self {
        let code = status.as_u16();
        match code {
            401 | 403 => SyncError::Auth(format!("{} rejected credentials ({}): {}", service, code, body)),
            404 => SyncError::NotFound(format!("{} resource not found: {}", service, body)),
            429 => SyncError::Transport(format!("{} rate limited: {}", service, body)),
            _ if status.is_server_error() => {
                SyncError::Transport(format!("{} API error {}: {}", service, code, body))
            }
            _ => SyncError::Rejected {
                status: code,
                message: format!("{} API error {}: {}", service, code, body),
            },
        }
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Transport(msg) => write!(f, "Transport error: {}", msg),
            SyncError::Auth(msg) => write!(f, "Authorization error: {}", msg),
            SyncError::Validation(msg) => write!(f, "Invalid configuration: {}", msg),
            SyncError::Rejected { message, .. } => write!(f, "Request rejected: {}", message),
            SyncError::NotFound(msg) => write!(f, "Not found: {}", msg),
            SyncError::AlreadyRunning(id) => write!(f, "Sync {} is already running", id),
            SyncError::PlanLimit(msg) => write!(f, "Plan limit reached: {}", msg),
            SyncError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<sea_orm::DbErr> for SyncError {
    fn from(err: sea_orm::DbErr) -> Self {
        SyncError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => SyncError::from_status("HTTP", status, err.to_string()),
            None => SyncError::Transport(err.to_string()),
        }
    }
}
