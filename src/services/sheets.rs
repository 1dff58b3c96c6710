//! Google Sheets values API client

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::services::error::SyncError;

pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";

#[async_trait]
pub trait SheetsApi: Send + Sync {
    async fn read_range(&self, token: &str, sheet_id: &str, range: &str) -> Result<Vec<Vec<String>>, SyncError>;

    async fn clear_range(&self, token: &str, sheet_id: &str, range: &str) -> Result<(), SyncError>;

    /// Overwrite starting at `range` with raw (unparsed) values
    async fn write_range(
        &self,
        token: &str,
        sheet_id: &str,
        range: &str,
        values: &[Vec<String>],
    ) -> Result<(), SyncError>;

    /// Insert rows after the last row of the table
    async fn append_rows(&self, token: &str, sheet_id: &str, values: &[Vec<String>]) -> Result<(), SyncError>;
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Cells come back as formatted strings, but numbers/bools are tolerated
fn cell_text(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Clone)]
pub struct SheetsService {
    client: Client,
    base_url: String,
}

impl SheetsService {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn values_url(&self, sheet_id: &str, range: &str) -> String {
        format!("{}/spreadsheets/{}/values/{}", self.base_url, sheet_id, range)
    }

    async fn check(response: Response) -> Result<Response, SyncError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        Err(SyncError::from_status("Sheets", status, error_text))
    }
}

#[async_trait]
impl SheetsApi for SheetsService {
    async fn read_range(&self, token: &str, sheet_id: &str, range: &str) -> Result<Vec<Vec<String>>, SyncError> {
        let response = self
            .client
            .get(self.values_url(sheet_id, range))
            .bearer_auth(token)
            .send()
            .await?;
        let data: ValueRange = Self::check(response).await?.json().await?;

        Ok(data
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn clear_range(&self, token: &str, sheet_id: &str, range: &str) -> Result<(), SyncError> {
        let url = format!("{}:clear", self.values_url(sheet_id, range));
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn write_range(
        &self,
        token: &str,
        sheet_id: &str,
        range: &str,
        values: &[Vec<String>],
    ) -> Result<(), SyncError> {
        let response = self
            .client
            .put(self.values_url(sheet_id, range))
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "values": values }))
            .send()
            .await?;
        Self::check(response).await?;

        info!(sheet_id = %sheet_id, rows = values.len(), "Updated sheet");
        Ok(())
    }

    async fn append_rows(&self, token: &str, sheet_id: &str, values: &[Vec<String>]) -> Result<(), SyncError> {
        if values.is_empty() {
            return Ok(());
        }
        let url = format!("{}:append", self.values_url(sheet_id, "A1"));
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&json!({ "values": values }))
            .send()
            .await?;
        Self::check(response).await?;

        info!(sheet_id = %sheet_id, rows = values.len(), "Appended rows to sheet");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_url() {
        let service = SheetsService::new(DEFAULT_SHEETS_BASE_URL.to_string());
        assert_eq!(
            service.values_url("abc", "A:Z"),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/A:Z"
        );
    }

    #[test]
    fn test_value_range_cells_become_text() {
        let data: ValueRange = serde_json::from_value(json!({
            "range": "Sheet1!A1:B2",
            "values": [["name", "qty"], ["Widget", 3]]
        }))
        .unwrap();
        let rows: Vec<Vec<String>> = data
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();
        assert_eq!(rows[1], vec!["Widget".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_missing_values_is_empty() {
        let data: ValueRange = serde_json::from_value(json!({"range": "Sheet1!A1:Z1000"})).unwrap();
        assert!(data.values.is_empty());
    }
}
