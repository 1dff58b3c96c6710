//! Strategies for finding the Notion page a sheet row should update
//!
//! The sheets -> notion path upserts: a matcher either names an existing
//! page (update) or returns `None` (create).

use async_trait::async_trait;
use tracing::debug;

use crate::models::notion::{DatabaseSchema, PropertyKind, RecordPatch};
use crate::models::sync::{FilterCondition, FilterOperator, SyncConfiguration};
use crate::services::error::SyncError;
use crate::services::filter::property_condition;
use crate::services::notion::NotionApi;
use crate::services::retry::RetryPolicy;

/// Everything a matcher may consult for one sync run
pub struct MatchContext<'a> {
    pub notion: &'a dyn NotionApi,
    pub token: &'a str,
    pub config: &'a SyncConfiguration,
    pub schema: &'a DatabaseSchema,
    pub retry: &'a RetryPolicy,
}

#[async_trait]
pub trait RecordMatcher: Send + Sync {
    /// Id of the page `patch` should be written to, if one exists
    async fn find_existing(&self, ctx: &MatchContext<'_>, patch: &RecordPatch) -> Result<Option<String>, SyncError>;
}

/// Matches on the configuration's key field.
///
/// Queries the target database for a page whose key property equals the
/// row's value. A row with an empty key value is created.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyFieldMatcher;

#[async_trait]
impl RecordMatcher for KeyFieldMatcher {
    async fn find_existing(&self, ctx: &MatchContext<'_>, patch: &RecordPatch) -> Result<Option<String>, SyncError> {
        let Some(key_field) = ctx.config.key_field.as_deref() else {
            return Ok(None);
        };
        let key_value = match patch.get(key_field) {
            Some(value) => value.plain_text(),
            None => return Ok(None),
        };
        if key_value.trim().is_empty() {
            return Ok(None);
        }

        let kind = ctx
            .schema
            .kind_of(key_field)
            .cloned()
            .unwrap_or(PropertyKind::RichText);
        let condition = FilterCondition {
            operator: FilterOperator::Equals,
            value: key_value.clone(),
        };
        let filter = property_condition(key_field, &kind, &condition).ok_or_else(|| {
            SyncError::Validation(format!(
                "key field '{}' of type {} cannot be matched on",
                key_field,
                kind.type_tag()
            ))
        })?;

        let notion = ctx.notion;
        let token = ctx.token;
        let database_id = ctx.config.notion_database_id.as_str();
        let pages = ctx
            .retry
            .run("notion.query_database", || notion.query_database(token, database_id, Some(&filter)))
            .await?;

        let found = pages.into_iter().next().map(|page| page.id);
        debug!(
            key_field = %key_field,
            key_value = %key_value,
            found = found.is_some(),
            "Looked up existing Notion page"
        );
        Ok(found)
    }
}

/// Never matches; every row becomes a new page
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOnlyMatcher;

#[async_trait]
impl RecordMatcher for CreateOnlyMatcher {
    async fn find_existing(&self, _ctx: &MatchContext<'_>, _patch: &RecordPatch) -> Result<Option<String>, SyncError> {
        Ok(None)
    }
}
