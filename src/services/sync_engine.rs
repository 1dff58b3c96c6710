//! Sync engine: runs one configuration end to end
//!
//! A run captures a validated `SyncConfiguration` snapshot, logs `started`,
//! performs notion -> sheets and/or sheets -> notion, commits the outcome on
//! the configuration with a single update and logs exactly one terminal
//! entry. At most one run per configuration id is in flight at any time.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::models::notion::DatabaseSchema;
use crate::models::sheets::{FULL_RANGE, WRITE_ANCHOR, rows_from_values, values_from_rows};
use crate::models::sync::{Credentials, RunOutcome, SyncConfiguration};
use crate::models::sync_log::NewRunLogEntry;
use crate::services::error::SyncError;
use crate::services::filter;
use crate::services::notion::NotionApi;
use crate::services::record_matcher::{KeyFieldMatcher, MatchContext, RecordMatcher};
use crate::services::relation_resolver::RelationResolver;
use crate::services::retry::RetryPolicy;
use crate::services::sheets::SheetsApi;
use crate::services::sync_log::RunLogSink;
use crate::services::sync_store::SyncStore;
use crate::services::transformer;

/// Ids of configurations with a run in flight
type InFlight = Arc<Mutex<HashSet<i32>>>;

/// Holds a configuration's slot in the in-flight set until dropped
struct RunGuard {
    sync_id: i32,
    in_flight: InFlight,
}

impl RunGuard {
    fn acquire(in_flight: &InFlight, sync_id: i32) -> Result<Self, SyncError> {
        if !in_flight.lock().insert(sync_id) {
            return Err(SyncError::AlreadyRunning(sync_id));
        }
        Ok(Self {
            sync_id,
            in_flight: Arc::clone(in_flight),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.sync_id);
    }
}

pub struct SyncEngine {
    notion: Arc<dyn NotionApi>,
    sheets: Arc<dyn SheetsApi>,
    store: Arc<dyn SyncStore>,
    log_sink: Arc<dyn RunLogSink>,
    matcher: Arc<dyn RecordMatcher>,
    retry: RetryPolicy,
    in_flight: InFlight,
}

impl SyncEngine {
    pub fn new(
        notion: Arc<dyn NotionApi>,
        sheets: Arc<dyn SheetsApi>,
        store: Arc<dyn SyncStore>,
        log_sink: Arc<dyn RunLogSink>,
    ) -> Self {
        Self {
            notion,
            sheets,
            store,
            log_sink,
            matcher: Arc::new(KeyFieldMatcher),
            retry: RetryPolicy::default(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn RecordMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_running(&self, sync_id: i32) -> bool {
        self.in_flight.lock().contains(&sync_id)
    }

    /// Trigger entry point: load, validate and run one configuration
    pub async fn run_sync(&self, sync_id: i32) -> Result<RunOutcome, SyncError> {
        let snapshot = self
            .store
            .load(sync_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("Sync {} not found", sync_id)))?;

        let config = match SyncConfiguration::try_from(snapshot.sync) {
            Ok(config) => config,
            Err(e) => {
                // Never started, but the attempt still lands in the audit log
                error!(sync_id = sync_id, error = %e, "Sync configuration is invalid");
                self.record_failure(sync_id, &e, None).await;
                return Err(e);
            }
        };

        self.run(&config, &snapshot.credentials).await
    }

    /// Execute one full sync pass for `config`
    pub async fn run(&self, config: &SyncConfiguration, credentials: &Credentials) -> Result<RunOutcome, SyncError> {
        let _guard = RunGuard::acquire(&self.in_flight, config.id)?;
        let started = Instant::now();

        info!(
            sync_id = config.id,
            name = %config.name,
            direction = config.direction.as_str(),
            "Sync started"
        );
        self.log_sink.append(NewRunLogEntry::started(config.id)).await?;

        let result = match self.execute(config, credentials).await {
            Ok(rows) => self.store.record_success(config.id, Utc::now()).await.map(|_| rows),
            Err(e) => Err(e),
        };
        let duration = started.elapsed().as_secs_f64();

        match result {
            Ok(rows) => {
                info!(
                    sync_id = config.id,
                    rows_processed = rows,
                    duration_secs = duration,
                    "Sync completed"
                );
                // Outcome is already committed
                if let Err(e) = self
                    .log_sink
                    .append(NewRunLogEntry::completed(config.id, rows, duration))
                    .await
                {
                    warn!(sync_id = config.id, error = %e, "Failed to write completed log entry");
                }
                Ok(RunOutcome::success(rows))
            }
            Err(e) => {
                error!(sync_id = config.id, error = %e, "Sync failed");
                self.record_failure(config.id, &e, Some(duration)).await;
                Err(e)
            }
        }
    }

    /// Mark the configuration failed and write its single `error` entry.
    ///
    /// Bookkeeping failures are logged; the run's own error is what the
    /// caller gets.
    async fn record_failure(&self, sync_id: i32, err: &SyncError, duration: Option<f64>) {
        if let Err(e) = self.store.record_failure(sync_id).await {
            warn!(sync_id = sync_id, error = %e, "Failed to record sync failure");
        }
        if let Err(e) = self
            .log_sink
            .append(NewRunLogEntry::failed(sync_id, err, duration))
            .await
        {
            warn!(sync_id = sync_id, error = %e, "Failed to write error log entry");
        }
    }

    async fn execute(&self, config: &SyncConfiguration, credentials: &Credentials) -> Result<u64, SyncError> {
        let mut rows = 0;

        if config.direction.includes_notion_to_sheets() {
            rows += self.sync_notion_to_sheets(config, credentials).await?;
        }
        if config.direction.includes_sheets_to_notion() {
            rows += self.sync_sheets_to_notion(config, credentials).await?;
        }

        Ok(rows)
    }

    async fn database_schema(&self, token: &str, config: &SyncConfiguration) -> Result<DatabaseSchema, SyncError> {
        let notion = self.notion.as_ref();
        let database_id = config.notion_database_id.as_str();
        self.retry
            .run("notion.get_database_schema", || notion.get_database_schema(token, database_id))
            .await
    }

    async fn sync_notion_to_sheets(&self, config: &SyncConfiguration, credentials: &Credentials) -> Result<u64, SyncError> {
        let notion_token = credentials.notion()?;
        let google_token = credentials.google()?;
        let notion = self.notion.as_ref();
        let sheets = self.sheets.as_ref();
        let database_id = config.notion_database_id.as_str();
        let sheet_id = config.sheet_id.as_str();

        // Property types are only needed to phrase the native filter
        let query_filter = if config.filters.is_empty() {
            filter::NotionFilter::default()
        } else {
            let schema = self.database_schema(notion_token, config).await?;
            filter::to_notion_filter(&config.filters, &config.mapping, &schema)
        };

        let pages = self
            .retry
            .run("notion.query_database", || {
                notion.query_database(notion_token, database_id, query_filter.native.as_ref())
            })
            .await?;

        let resolver = RelationResolver::new(notion, notion_token, &self.retry);
        let mut rows = Vec::with_capacity(pages.len());
        for page in &pages {
            rows.push(transformer::to_row(page, &config.mapping, &resolver).await);
        }
        rows.retain(|row| filter::matches(row, &query_filter.residual));

        // Full replace: clear the data range, then header + rows from A1
        let values = values_from_rows(&config.mapping.columns(), &rows);
        self.retry
            .run("sheets.clear_range", || sheets.clear_range(google_token, sheet_id, FULL_RANGE))
            .await?;
        self.retry
            .run("sheets.write_range", || {
                sheets.write_range(google_token, sheet_id, WRITE_ANCHOR, &values)
            })
            .await?;

        info!(sync_id = config.id, rows = rows.len(), "Synced rows from Notion to Sheets");
        Ok(rows.len() as u64)
    }

    async fn sync_sheets_to_notion(&self, config: &SyncConfiguration, credentials: &Credentials) -> Result<u64, SyncError> {
        let notion_token = credentials.notion()?;
        let google_token = credentials.google()?;
        let notion = self.notion.as_ref();
        let sheets = self.sheets.as_ref();
        let database_id = config.notion_database_id.as_str();
        let sheet_id = config.sheet_id.as_str();

        let values = self
            .retry
            .run("sheets.read_range", || sheets.read_range(google_token, sheet_id, FULL_RANGE))
            .await?;
        let rows = rows_from_values(values);
        let total = rows.len();

        let schema = self.database_schema(notion_token, config).await?;
        let ctx = MatchContext {
            notion,
            token: notion_token,
            config,
            schema: &schema,
            retry: &self.retry,
        };

        let mut created = 0u64;
        let mut updated = 0u64;
        for row in rows.iter().filter(|row| filter::matches(row, &config.filters)) {
            let patch = transformer::to_record(row, &config.mapping, &schema);
            if patch.is_empty() {
                continue;
            }

            match self.matcher.find_existing(&ctx, &patch).await? {
                Some(page_id) => {
                    let page_id = page_id.as_str();
                    self.retry
                        .run("notion.update_page", || notion.update_page(notion_token, page_id, &patch))
                        .await?;
                    updated += 1;
                }
                None => {
                    self.retry
                        .run("notion.create_page", || notion.create_page(notion_token, database_id, &patch))
                        .await?;
                    created += 1;
                }
            }
        }

        info!(
            sync_id = config.id,
            rows_read = total,
            created = created,
            updated = updated,
            "Synced rows from Sheets to Notion"
        );
        Ok(created + updated)
    }
}
