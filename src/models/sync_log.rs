//! Run log entries: request/response models and the append payload

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::sync_logs;
use crate::services::error::SyncError;

/// Entries per page on the audit log endpoint
pub const LOGS_PER_PAGE: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogPhase {
    Started,
    Completed,
    Error,
}

impl LogPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogPhase::Started => "started",
            LogPhase::Completed => "completed",
            LogPhase::Error => "error",
        }
    }
}

/// A log entry about to be appended
#[derive(Debug, Clone, PartialEq)]
pub struct NewRunLogEntry {
    pub sync_id: i32,
    pub phase: LogPhase,
    pub message: String,
    pub rows_processed: u64,
    pub errors: Option<serde_json::Value>,
    pub duration_seconds: Option<f64>,
}

impl NewRunLogEntry {
    pub fn started(sync_id: i32) -> Self {
        Self {
            sync_id,
            phase: LogPhase::Started,
            message: "Sync started".to_string(),
            rows_processed: 0,
            errors: None,
            duration_seconds: None,
        }
    }

    pub fn completed(sync_id: i32, rows_processed: u64, duration_seconds: f64) -> Self {
        Self {
            sync_id,
            phase: LogPhase::Completed,
            message: "Sync completed successfully".to_string(),
            rows_processed,
            errors: None,
            duration_seconds: Some(duration_seconds),
        }
    }

    pub fn failed(sync_id: i32, err: &SyncError, duration_seconds: Option<f64>) -> Self {
        Self {
            sync_id,
            phase: LogPhase::Error,
            message: format!("Sync failed: {}", err),
            rows_processed: 0,
            errors: Some(err.detail()),
            duration_seconds,
        }
    }
}

/// External shape of one log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub id: i32,
    pub status: String,
    pub message: String,
    pub rows_processed: i32,
    pub duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<sync_logs::Model> for RunLogEntry {
    fn from(model: sync_logs::Model) -> Self {
        Self {
            id: model.id,
            status: model.status,
            message: model.message,
            rows_processed: model.rows_processed,
            duration_seconds: model.duration_seconds,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_page")]
    pub page: u64,
}

fn default_page() -> u64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsPageResponse {
    pub logs: Vec<RunLogEntry>,
    pub total: u64,
    pub pages: u64,
    pub current_page: u64,
}
