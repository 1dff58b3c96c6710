//! Sync configurations: one row per recurring Notion <-> Sheets job

use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260301_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Syncs::Table)
                    .if_not_exists()
                    .col(pk_auto(Syncs::Id))
                    .col(integer(Syncs::UserId).not_null())
                    .col(string(Syncs::Name).not_null())
                    .col(string(Syncs::NotionDatabaseId).not_null())
                    .col(string(Syncs::SheetId).not_null())
                    // `json` rather than `jsonb` so mapping key order survives
                    .col(json(Syncs::Mapping).not_null())
                    .col(json(Syncs::Filters).not_null())
                    .col(string_null(Syncs::KeyField))
                    .col(string(Syncs::Frequency).not_null().default("daily"))
                    .col(string(Syncs::SyncDirection).not_null().default("both"))
                    .col(string(Syncs::Status).not_null().default("active"))
                    .col(timestamp_with_time_zone_null(Syncs::LastSync))
                    .col(
                        timestamp_with_time_zone(Syncs::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Syncs::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_syncs_user_id")
                            .from(Syncs::Table, Syncs::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Scheduler selects by (frequency, status)
        manager
            .create_index(
                Index::create()
                    .name("idx_syncs_frequency_status")
                    .table(Syncs::Table)
                    .col(Syncs::Frequency)
                    .col(Syncs::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_syncs_user_id")
                    .table(Syncs::Table)
                    .col(Syncs::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Syncs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum Syncs {
    Table,
    Id,
    UserId,
    Name,
    NotionDatabaseId,
    SheetId,
    Mapping,
    Filters,
    KeyField,
    Frequency,
    SyncDirection,
    Status,
    LastSync,
    CreatedAt,
    UpdatedAt,
}
