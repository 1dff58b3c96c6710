//! Run log sink and audit reads

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set};

use crate::entities::{prelude::*, sync_logs};
use crate::models::sync_log::{LogsPageResponse, NewRunLogEntry, RunLogEntry};
use crate::services::error::SyncError;

/// Append-only store of run lifecycle events
#[async_trait]
pub trait RunLogSink: Send + Sync {
    async fn append(&self, entry: NewRunLogEntry) -> Result<(), SyncError>;
}

#[derive(Clone)]
pub struct SyncLogService {
    db: DatabaseConnection,
}

impl SyncLogService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Newest first; `page` is 1-based
    pub async fn list_logs(&self, sync_id: i32, page: u64, per_page: u64) -> Result<LogsPageResponse, SyncError> {
        let page = page.max(1);
        let paginator = SyncLogs::find()
            .filter(sync_logs::Column::SyncId.eq(sync_id))
            .order_by_desc(sync_logs::Column::CreatedAt)
            .order_by_desc(sync_logs::Column::Id)
            .paginate(&self.db, per_page);

        let counts = paginator.num_items_and_pages().await?;
        let logs = paginator.fetch_page(page - 1).await?;

        Ok(LogsPageResponse {
            logs: logs.into_iter().map(RunLogEntry::from).collect(),
            total: counts.number_of_items,
            pages: counts.number_of_pages,
            current_page: page,
        })
    }
}

#[async_trait]
impl RunLogSink for SyncLogService {
    async fn append(&self, entry: NewRunLogEntry) -> Result<(), SyncError> {
        sync_logs::ActiveModel {
            sync_id: Set(entry.sync_id),
            status: Set(entry.phase.as_str().to_string()),
            message: Set(entry.message),
            rows_processed: Set(i32::try_from(entry.rows_processed).unwrap_or(i32::MAX)),
            errors: Set(entry.errors),
            duration_seconds: Set(entry.duration_seconds),
            created_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }
}
