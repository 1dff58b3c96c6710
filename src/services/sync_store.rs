//! Persistence of sync configurations
//!
//! `SyncStore` is what the engine and scheduler need from the database:
//! load a snapshot, list candidates, and commit a run's outcome with a
//! single update. `DbSyncStore` is the SeaORM implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set,
    sea_query::Expr,
};
use std::str::FromStr;
use tracing::{debug, info};

use crate::entities::{prelude::*, syncs};
use crate::models::sync::{
    CreateSyncRequest, Credentials, FieldMapping, FilterSet, Frequency, SyncDirection, SyncStatus,
    validate_key_field,
};
use crate::models::user::PlanType;
use crate::services::error::SyncError;

/// A configuration row plus its owner's tokens, read together
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot {
    pub sync: syncs::Model,
    pub credentials: Credentials,
}

#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn load(&self, sync_id: i32) -> Result<Option<SyncSnapshot>, SyncError>;

    async fn find_by_frequency_and_status(
        &self,
        frequency: Frequency,
        status: SyncStatus,
    ) -> Result<Vec<syncs::Model>, SyncError>;

    /// `last_sync = at`, `status = active`
    async fn record_success(&self, sync_id: i32, at: DateTime<Utc>) -> Result<(), SyncError>;

    /// `status = error`; `last_sync` is left as it was
    async fn record_failure(&self, sync_id: i32) -> Result<(), SyncError>;
}

#[derive(Clone)]
pub struct DbSyncStore {
    db: DatabaseConnection,
}

impl DbSyncStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a configuration for a user, enforcing the plan's sync limit
    pub async fn create(&self, request: CreateSyncRequest) -> Result<syncs::Model, SyncError> {
        validate_request(&request)?;

        let user = Users::find_by_id(request.user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("User {} not found", request.user_id)))?;

        let plan = PlanType::from_str(&user.plan_type).unwrap_or(PlanType::Free);
        let current = Syncs::find()
            .filter(syncs::Column::UserId.eq(user.id))
            .count(&self.db)
            .await?;
        if !plan.can_create_sync(current) {
            return Err(SyncError::PlanLimit(format!(
                "{} plan allows {} sync(s)",
                user.plan_type,
                plan.sync_limit().unwrap_or_default()
            )));
        }

        let now = Utc::now().fixed_offset();
        let model = syncs::ActiveModel {
            user_id: Set(user.id),
            name: Set(request.name),
            notion_database_id: Set(request.notion_database_id),
            sheet_id: Set(request.sheet_id),
            mapping: Set(request.mapping),
            filters: Set(normalize_filters(request.filters)),
            key_field: Set(request.key_field),
            frequency: Set(request.frequency),
            sync_direction: Set(request.sync_direction),
            status: Set(SyncStatus::Active.as_str().to_string()),
            last_sync: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(sync_id = model.id, user_id = model.user_id, "Created sync configuration");
        Ok(model)
    }
}

fn normalize_filters(filters: serde_json::Value) -> serde_json::Value {
    if filters.is_null() {
        serde_json::json!({})
    } else {
        filters
    }
}

/// Same checks a run performs, so a bad configuration is refused up front
fn validate_request(request: &CreateSyncRequest) -> Result<(), SyncError> {
    if request.name.trim().is_empty() {
        return Err(SyncError::Validation("name is required".to_string()));
    }
    if request.notion_database_id.trim().is_empty() || request.sheet_id.trim().is_empty() {
        return Err(SyncError::Validation(
            "notion_database_id and sheet_id are required".to_string(),
        ));
    }
    let mapping = FieldMapping::from_json(&request.mapping)?;
    if mapping.is_empty() {
        return Err(SyncError::Validation("mapping is empty".to_string()));
    }
    FilterSet::from_json(&request.filters)?;
    Frequency::from_str(&request.frequency)?;
    let direction = SyncDirection::from_str(&request.sync_direction)?;
    validate_key_field(direction, request.key_field.as_deref(), &mapping)
}

#[async_trait]
impl SyncStore for DbSyncStore {
    async fn load(&self, sync_id: i32) -> Result<Option<SyncSnapshot>, SyncError> {
        let found = Syncs::find_by_id(sync_id)
            .find_also_related(Users)
            .one(&self.db)
            .await?;

        Ok(found.map(|(sync, user)| {
            let credentials = user
                .map(|u| Credentials {
                    notion_access_token: u.notion_access_token,
                    google_access_token: u.google_access_token,
                })
                .unwrap_or_default();
            SyncSnapshot { sync, credentials }
        }))
    }

    async fn find_by_frequency_and_status(
        &self,
        frequency: Frequency,
        status: SyncStatus,
    ) -> Result<Vec<syncs::Model>, SyncError> {
        let found = Syncs::find()
            .filter(syncs::Column::Frequency.eq(frequency.as_str()))
            .filter(syncs::Column::Status.eq(status.as_str()))
            .all(&self.db)
            .await?;
        Ok(found)
    }

    async fn record_success(&self, sync_id: i32, at: DateTime<Utc>) -> Result<(), SyncError> {
        let at = at.fixed_offset();
        Syncs::update_many()
            .col_expr(syncs::Column::LastSync, Expr::value(Some(at)))
            .col_expr(syncs::Column::Status, Expr::value(SyncStatus::Active.as_str()))
            .col_expr(syncs::Column::UpdatedAt, Expr::value(at))
            .filter(syncs::Column::Id.eq(sync_id))
            .exec(&self.db)
            .await?;

        debug!(sync_id = sync_id, "Recorded successful sync");
        Ok(())
    }

    async fn record_failure(&self, sync_id: i32) -> Result<(), SyncError> {
        Syncs::update_many()
            .col_expr(syncs::Column::Status, Expr::value(SyncStatus::Error.as_str()))
            .col_expr(syncs::Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(syncs::Column::Id.eq(sync_id))
            .exec(&self.db)
            .await?;

        debug!(sync_id = sync_id, "Recorded failed sync");
        Ok(())
    }
}
