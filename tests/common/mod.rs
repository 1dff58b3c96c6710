//! In-memory stand-ins for the engine's collaborators
#![allow(dead_code)]

use async_trait::async_trait;
use bettersync_backend::entities::syncs;
use bettersync_backend::models::notion::{DatabaseSchema, NotionPage, PropertyKind, RecordPatch};
use bettersync_backend::models::sync::{Credentials, Frequency, SyncStatus};
use bettersync_backend::models::sync_log::{LogPhase, NewRunLogEntry};
use bettersync_backend::services::error::SyncError;
use bettersync_backend::services::notion::NotionApi;
use bettersync_backend::services::retry::RetryPolicy;
use bettersync_backend::services::sheets::SheetsApi;
use bettersync_backend::services::sync_engine::SyncEngine;
use bettersync_backend::services::sync_log::RunLogSink;
use bettersync_backend::services::sync_store::{SyncSnapshot, SyncStore};
use bettersync_backend::services::transformer::extract_text;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

pub fn notion_page(id: &str, properties: Value) -> NotionPage {
    serde_json::from_value(json!({ "id": id, "properties": properties })).unwrap()
}

pub fn title(text: &str) -> Value {
    json!({ "type": "title", "title": [{ "plain_text": text }] })
}

pub fn select(name: &str) -> Value {
    json!({ "type": "select", "select": { "name": name } })
}

pub fn sync_model(id: i32, direction: &str) -> syncs::Model {
    let now = Utc::now().fixed_offset();
    syncs::Model {
        id,
        user_id: 1,
        name: format!("sync {}", id),
        notion_database_id: "db-1".to_string(),
        sheet_id: "sheet-1".to_string(),
        mapping: json!({ "Name": "col_name", "Status": "col_status" }),
        filters: json!({}),
        key_field: Some("Name".to_string()),
        frequency: Frequency::Hourly.as_str().to_string(),
        sync_direction: direction.to_string(),
        status: SyncStatus::Active.as_str().to_string(),
        last_sync: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn connected() -> Credentials {
    Credentials {
        notion_access_token: Some("notion-token".to_string()),
        google_access_token: Some("google-token".to_string()),
    }
}

#[derive(Default)]
pub struct FakeNotion {
    pub pages: Mutex<Vec<NotionPage>>,
    pub schema: Mutex<DatabaseSchema>,
    pub filters_seen: Mutex<Vec<Option<Value>>>,
    pub created: Mutex<Vec<RecordPatch>>,
    pub updated: Mutex<Vec<(String, RecordPatch)>>,
    pub query_error: Mutex<Option<SyncError>>,
    pub query_calls: AtomicUsize,
}

impl FakeNotion {
    pub fn with_pages(pages: Vec<NotionPage>) -> Self {
        let fake = Self::default();
        *fake.pages.lock() = pages;
        *fake.schema.lock() = DatabaseSchema::new([("Name", PropertyKind::Title), ("Status", PropertyKind::Select)]);
        fake
    }

    fn matches_lookup(page: &NotionPage, filter: &Value) -> bool {
        let Some(property) = filter.get("property").and_then(Value::as_str) else {
            return true;
        };
        let wanted = filter
            .as_object()
            .into_iter()
            .flatten()
            .filter(|(k, _)| k.as_str() != "property")
            .find_map(|(_, cond)| cond.get("equals").and_then(Value::as_str));

        let actual = page
            .property(property)
            .and_then(Result::ok)
            .map(|value| extract_text(&value));
        match wanted {
            Some(wanted) => actual.as_deref() == Some(wanted),
            None => true,
        }
    }
}

#[async_trait]
impl NotionApi for FakeNotion {
    async fn query_database(&self, _: &str, _: &str, filter: Option<&Value>) -> Result<Vec<NotionPage>, SyncError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.filters_seen.lock().push(filter.cloned());
        if let Some(err) = self.query_error.lock().clone() {
            return Err(err);
        }

        let pages = self.pages.lock();
        Ok(match filter {
            Some(f) => pages.iter().filter(|p| Self::matches_lookup(p, f)).cloned().collect(),
            None => pages.clone(),
        })
    }

    async fn get_page(&self, _: &str, page_id: &str) -> Result<Option<NotionPage>, SyncError> {
        Ok(self.pages.lock().iter().find(|p| p.id == page_id).cloned())
    }

    async fn create_page(&self, _: &str, _: &str, patch: &RecordPatch) -> Result<(), SyncError> {
        self.created.lock().push(patch.clone());
        Ok(())
    }

    async fn update_page(&self, _: &str, page_id: &str, patch: &RecordPatch) -> Result<(), SyncError> {
        self.updated.lock().push((page_id.to_string(), patch.clone()));
        Ok(())
    }

    async fn get_database_schema(&self, _: &str, _: &str) -> Result<DatabaseSchema, SyncError> {
        Ok(self.schema.lock().clone())
    }
}

/// Sheet held in memory. Writes can be made to fail, to panic, or to block
/// until released, to observe a run mid-flight.
#[derive(Default)]
pub struct FakeSheets {
    pub values: Mutex<Vec<Vec<String>>>,
    pub write_error: Mutex<Option<SyncError>>,
    pub panic_on_sheet: Mutex<Option<String>>,
    pub write_calls: AtomicUsize,
    pub clear_calls: AtomicUsize,
    pub hold_writes: Mutex<bool>,
    pub write_entered: Notify,
    pub release_write: Notify,
}

impl FakeSheets {
    pub fn with_values(values: Vec<Vec<&str>>) -> Self {
        let fake = Self::default();
        *fake.values.lock() = values
            .into_iter()
            .map(|row| row.into_iter().map(str::to_string).collect())
            .collect();
        fake
    }
}

#[async_trait]
impl SheetsApi for FakeSheets {
    async fn read_range(&self, _: &str, _: &str, _: &str) -> Result<Vec<Vec<String>>, SyncError> {
        Ok(self.values.lock().clone())
    }

    async fn clear_range(&self, _: &str, _: &str, _: &str) -> Result<(), SyncError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        self.values.lock().clear();
        Ok(())
    }

    async fn write_range(&self, _: &str, sheet_id: &str, _: &str, values: &[Vec<String>]) -> Result<(), SyncError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let crash = self.panic_on_sheet.lock().as_deref() == Some(sheet_id);
        if crash {
            panic!("sheets client crashed writing {}", sheet_id);
        }
        let hold = *self.hold_writes.lock();
        if hold {
            self.write_entered.notify_one();
            self.release_write.notified().await;
        }
        if let Some(err) = self.write_error.lock().clone() {
            return Err(err);
        }
        *self.values.lock() = values.to_vec();
        Ok(())
    }

    async fn append_rows(&self, _: &str, _: &str, values: &[Vec<String>]) -> Result<(), SyncError> {
        self.values.lock().extend(values.iter().cloned());
        Ok(())
    }
}

/// Configurations held in memory. Loading one id can be made to block
/// until released.
#[derive(Default)]
pub struct MemoryStore {
    pub snapshots: Mutex<HashMap<i32, SyncSnapshot>>,
    pub hold_load: Mutex<Option<i32>>,
    pub load_entered: Notify,
    pub release_load: Notify,
}

impl MemoryStore {
    pub fn with(models: Vec<syncs::Model>) -> Self {
        let store = Self::default();
        for sync in models {
            store.snapshots.lock().insert(
                sync.id,
                SyncSnapshot {
                    sync,
                    credentials: connected(),
                },
            );
        }
        store
    }

    pub fn sync(&self, id: i32) -> syncs::Model {
        self.snapshots.lock()[&id].sync.clone()
    }

    pub fn set_last_sync(&self, id: i32, at: Option<DateTime<Utc>>) {
        if let Some(snapshot) = self.snapshots.lock().get_mut(&id) {
            snapshot.sync.last_sync = at.map(|t| t.fixed_offset());
        }
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn load(&self, sync_id: i32) -> Result<Option<SyncSnapshot>, SyncError> {
        let hold = *self.hold_load.lock() == Some(sync_id);
        if hold {
            self.load_entered.notify_one();
            self.release_load.notified().await;
        }
        Ok(self.snapshots.lock().get(&sync_id).cloned())
    }

    async fn find_by_frequency_and_status(
        &self,
        frequency: Frequency,
        status: SyncStatus,
    ) -> Result<Vec<syncs::Model>, SyncError> {
        Ok(self
            .snapshots
            .lock()
            .values()
            .filter(|s| s.sync.frequency == frequency.as_str() && s.sync.status == status.as_str())
            .map(|s| s.sync.clone())
            .collect())
    }

    async fn record_success(&self, sync_id: i32, at: DateTime<Utc>) -> Result<(), SyncError> {
        if let Some(snapshot) = self.snapshots.lock().get_mut(&sync_id) {
            snapshot.sync.last_sync = Some(at.fixed_offset());
            snapshot.sync.status = SyncStatus::Active.as_str().to_string();
        }
        Ok(())
    }

    async fn record_failure(&self, sync_id: i32) -> Result<(), SyncError> {
        if let Some(snapshot) = self.snapshots.lock().get_mut(&sync_id) {
            snapshot.sync.status = SyncStatus::Error.as_str().to_string();
        }
        Ok(())
    }
}

/// Appends can be made to fail for one phase
#[derive(Default)]
pub struct MemoryLogSink {
    pub entries: Mutex<Vec<NewRunLogEntry>>,
    pub fail_phase: Mutex<Option<LogPhase>>,
}

impl MemoryLogSink {
    pub fn phases(&self, sync_id: i32) -> Vec<LogPhase> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.sync_id == sync_id)
            .map(|e| e.phase)
            .collect()
    }

    pub fn last(&self) -> Option<NewRunLogEntry> {
        self.entries.lock().last().cloned()
    }
}

#[async_trait]
impl RunLogSink for MemoryLogSink {
    async fn append(&self, entry: NewRunLogEntry) -> Result<(), SyncError> {
        if *self.fail_phase.lock() == Some(entry.phase) {
            return Err(SyncError::Database("connection closed".to_string()));
        }
        self.entries.lock().push(entry);
        Ok(())
    }
}

pub struct Harness {
    pub notion: Arc<FakeNotion>,
    pub sheets: Arc<FakeSheets>,
    pub store: Arc<MemoryStore>,
    pub logs: Arc<MemoryLogSink>,
    pub engine: Arc<SyncEngine>,
}

pub fn harness(notion: FakeNotion, sheets: FakeSheets, store: MemoryStore) -> Harness {
    let notion = Arc::new(notion);
    let sheets = Arc::new(sheets);
    let store = Arc::new(store);
    let logs = Arc::new(MemoryLogSink::default());
    let engine = Arc::new(
        SyncEngine::new(notion.clone(), sheets.clone(), store.clone(), logs.clone())
            .with_retry_policy(RetryPolicy::new(3, Duration::ZERO)),
    );

    Harness {
        notion,
        sheets,
        store,
        logs,
        engine,
    }
}
