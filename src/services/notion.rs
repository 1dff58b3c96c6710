//! Notion API client
//!
//! `NotionApi` is the contract the sync engine depends on; `NotionService`
//! implements it over the public REST API. Retrying is the caller's job
//! (see `RetryPolicy`); this client only classifies failures.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::models::notion::{DatabaseSchema, NotionPage, RecordPatch};
use crate::services::error::SyncError;

pub const DEFAULT_NOTION_BASE_URL: &str = "https://api.notion.com/v1";

/// API version pinned in every request
pub const NOTION_VERSION: &str = "2022-06-28";

#[async_trait]
pub trait NotionApi: Send + Sync {
    /// All pages of a database matching `filter`; pagination is transparent
    async fn query_database(
        &self,
        token: &str,
        database_id: &str,
        filter: Option<&Value>,
    ) -> Result<Vec<NotionPage>, SyncError>;

    /// `Ok(None)` when the page does not exist or is not shared with us
    async fn get_page(&self, token: &str, page_id: &str) -> Result<Option<NotionPage>, SyncError>;

    async fn create_page(
        &self,
        token: &str,
        database_id: &str,
        patch: &RecordPatch,
    ) -> Result<(), SyncError>;

    async fn update_page(&self, token: &str, page_id: &str, patch: &RecordPatch) -> Result<(), SyncError>;

    async fn get_database_schema(&self, token: &str, database_id: &str) -> Result<DatabaseSchema, SyncError>;
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<NotionPage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Clone)]
pub struct NotionService {
    client: Client,
    base_url: String,
}

impl NotionService {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn authorized(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder
            .bearer_auth(token)
            .header("Notion-Version", NOTION_VERSION)
            .header("Content-Type", "application/json")
    }

    async fn check(response: Response) -> Result<Response, SyncError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        Err(SyncError::from_status("Notion", status, error_text))
    }
}

/// Body for `POST /databases/{id}/query`
pub fn query_body(filter: Option<&Value>, start_cursor: Option<&str>) -> Value {
    let mut body = json!({});
    if let Some(filter) = filter {
        body["filter"] = filter.clone();
    }
    if let Some(cursor) = start_cursor {
        body["start_cursor"] = json!(cursor);
    }
    body
}

#[async_trait]
impl NotionApi for NotionService {
    async fn query_database(
        &self,
        token: &str,
        database_id: &str,
        filter: Option<&Value>,
    ) -> Result<Vec<NotionPage>, SyncError> {
        let url = format!("{}/databases/{}/query", self.base_url, database_id);
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let body = query_body(filter, cursor.as_deref());
            let response = self
                .authorized(self.client.post(&url), token)
                .json(&body)
                .send()
                .await?;
            let page: QueryResponse = Self::check(response).await?.json().await?;

            debug!(
                database_id = %database_id,
                fetched = page.results.len(),
                has_more = page.has_more,
                "Fetched Notion query page"
            );
            results.extend(page.results);

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        info!(database_id = %database_id, count = results.len(), "Fetched Notion database rows");
        Ok(results)
    }

    async fn get_page(&self, token: &str, page_id: &str) -> Result<Option<NotionPage>, SyncError> {
        let url = format!("{}/pages/{}", self.base_url, page_id);
        let response = self.authorized(self.client.get(&url), token).send().await?;

        match Self::check(response).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(SyncError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_page(
        &self,
        token: &str,
        database_id: &str,
        patch: &RecordPatch,
    ) -> Result<(), SyncError> {
        let url = format!("{}/pages", self.base_url);
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": patch.to_notion_properties(),
        });
        let response = self
            .authorized(self.client.post(&url), token)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn update_page(&self, token: &str, page_id: &str, patch: &RecordPatch) -> Result<(), SyncError> {
        let url = format!("{}/pages/{}", self.base_url, page_id);
        let body = json!({ "properties": patch.to_notion_properties() });
        let response = self
            .authorized(self.client.patch(&url), token)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn get_database_schema(&self, token: &str, database_id: &str) -> Result<DatabaseSchema, SyncError> {
        let url = format!("{}/databases/{}", self.base_url, database_id);
        let response = self.authorized(self.client.get(&url), token).send().await?;
        let raw: Value = Self::check(response).await?.json().await?;
        Ok(DatabaseSchema::from_json(&raw))
    }
}
