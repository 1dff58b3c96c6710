//! `SeaORM` Entity for sync_logs table (append-only)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub sync_id: i32,
    /// started, completed, error
    pub status: String,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub rows_processed: i32,
    #[sea_orm(column_type = "JsonBinary")]
    pub errors: Option<Json>,
    pub duration_seconds: Option<f64>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::syncs::Entity",
        from = "Column::SyncId",
        to = "super::syncs::Column::Id"
    )]
    Syncs,
}

impl Related<super::syncs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Syncs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
