use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Email)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::Name).string_len(255).not_null())
                    // OAuth tokens, written by the OAuth callback
                    .col(ColumnDef::new(Users::NotionAccessToken).text().null())
                    .col(ColumnDef::new(Users::NotionRefreshToken).text().null())
                    .col(ColumnDef::new(Users::GoogleAccessToken).text().null())
                    .col(ColumnDef::new(Users::GoogleRefreshToken).text().null())
                    .col(
                        ColumnDef::new(Users::PlanType)
                            .string_len(50)
                            .not_null()
                            .default("free"),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum Users {
    Table,
    Id,
    Email,
    Name,
    NotionAccessToken,
    NotionRefreshToken,
    GoogleAccessToken,
    GoogleRefreshToken,
    PlanType,
    CreatedAt,
    UpdatedAt,
}
