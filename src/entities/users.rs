//! `SeaORM` Entity for users table
//!
//! Only the columns the sync engine and OAuth flow touch are mapped here;
//! account management lives in the frontend.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub notion_access_token: Option<String>,
    #[serde(skip_serializing)]
    pub notion_refresh_token: Option<String>,
    #[serde(skip_serializing)]
    pub google_access_token: Option<String>,
    #[serde(skip_serializing)]
    pub google_refresh_token: Option<String>,
    /// free, starter, pro, business
    pub plan_type: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::syncs::Entity")]
    Syncs,
}

impl Related<super::syncs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Syncs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
