//! `SeaORM` Entity for syncs table (one row per sync configuration)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "syncs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub notion_database_id: String,
    pub sheet_id: String,
    /// Ordered object: Notion property name -> sheet column
    #[sea_orm(column_type = "Json")]
    pub mapping: Json,
    /// Object: field -> {"operator": .., "value": ..}
    #[sea_orm(column_type = "Json")]
    pub filters: Json,
    /// Notion property used to match existing pages on sheets -> notion upserts
    pub key_field: Option<String>,
    /// realtime, hourly, daily, weekly
    pub frequency: String,
    /// notion_to_sheets, sheets_to_notion, both
    pub sync_direction: String,
    /// active, paused, error
    pub status: String,
    pub last_sync: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(has_many = "super::sync_logs::Entity")]
    SyncLogs,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::sync_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyncLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
