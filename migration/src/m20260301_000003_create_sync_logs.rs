//! Append-only run log for sync executions

use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260301_000002_create_syncs::Syncs;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncLogs::Table)
                    .if_not_exists()
                    .col(pk_auto(SyncLogs::Id))
                    .col(integer(SyncLogs::SyncId).not_null())
                    // started | completed | error
                    .col(string_len(SyncLogs::Status, 50).not_null())
                    .col(text(SyncLogs::Message).not_null())
                    .col(integer(SyncLogs::RowsProcessed).not_null().default(0))
                    .col(json_binary_null(SyncLogs::Errors))
                    .col(double_null(SyncLogs::DurationSeconds))
                    .col(
                        timestamp_with_time_zone(SyncLogs::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sync_logs_sync_id")
                            .from(SyncLogs::Table, SyncLogs::SyncId)
                            .to(Syncs::Table, Syncs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Audit reads are per sync, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_logs_sync_created")
                    .table(SyncLogs::Table)
                    .col(SyncLogs::SyncId)
                    .col(SyncLogs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SyncLogs {
    Table,
    Id,
    SyncId,
    Status,
    Message,
    RowsProcessed,
    Errors,
    DurationSeconds,
    CreatedAt,
}
