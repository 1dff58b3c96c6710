mod common;

use bettersync_backend::jobs::sync_scheduler::{ScheduledRuns, schedule_due_syncs, start_sync_scheduler};
use bettersync_backend::models::sync::SyncStatus;
use bettersync_backend::models::sync_log::LogPhase;
use bettersync_backend::services::sync_store::SyncStore;
use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::watch;

fn page() -> bettersync_backend::models::notion::NotionPage {
    notion_page("p-1", json!({ "Name": title("Widget"), "Status": select("Active") }))
}

#[tokio::test]
async fn test_only_due_active_syncs_are_started() {
    let never_run = sync_model(1, "notion_to_sheets");
    let mut recent = sync_model(2, "notion_to_sheets");
    recent.last_sync = Some((Utc::now() - ChronoDuration::minutes(10)).fixed_offset());
    let mut stale = sync_model(3, "notion_to_sheets");
    stale.last_sync = Some((Utc::now() - ChronoDuration::hours(2)).fixed_offset());
    let mut paused = sync_model(4, "notion_to_sheets");
    paused.status = SyncStatus::Paused.as_str().to_string();

    let h = harness(
        FakeNotion::with_pages(vec![page()]),
        FakeSheets::default(),
        MemoryStore::with(vec![never_run, recent, stale, paused]),
    );
    let store: Arc<dyn SyncStore> = h.store.clone();

    let mut runs = ScheduledRuns::default();
    let started = schedule_due_syncs(&h.engine, store.as_ref(), Utc::now(), &mut runs)
        .await
        .unwrap();
    assert_eq!(started, 2);

    let mut finished = runs.wait_all().await;
    finished.sort();
    assert_eq!(finished, vec![1, 3]);

    assert!(h.store.sync(1).last_sync.is_some());
    assert!(h.store.sync(4).last_sync.is_none());
    assert_eq!(h.logs.phases(2), Vec::new());
}

#[tokio::test]
async fn test_in_flight_sync_is_not_scheduled_twice() {
    let sheets = FakeSheets::default();
    *sheets.hold_writes.lock() = true;
    let h = harness(
        FakeNotion::with_pages(vec![page()]),
        sheets,
        MemoryStore::with(vec![sync_model(1, "notion_to_sheets")]),
    );
    let store: Arc<dyn SyncStore> = h.store.clone();

    let mut runs = ScheduledRuns::default();
    let first = schedule_due_syncs(&h.engine, store.as_ref(), Utc::now(), &mut runs)
        .await
        .unwrap();
    assert_eq!(first, 1);
    tokio::time::timeout(Duration::from_secs(5), h.sheets.write_entered.notified())
        .await
        .expect("run reached the write");

    let second = schedule_due_syncs(&h.engine, store.as_ref(), Utc::now(), &mut runs)
        .await
        .unwrap();
    assert_eq!(second, 0);

    h.sheets.release_write.notify_one();
    runs.wait_all().await;
    assert_eq!(h.sheets.write_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_crashed_run_does_not_release_other_pending_runs() {
    let mut crashing = sync_model(1, "notion_to_sheets");
    crashing.sheet_id = "crash".to_string();
    let pending = sync_model(2, "notion_to_sheets");

    let sheets = FakeSheets::default();
    *sheets.panic_on_sheet.lock() = Some("crash".to_string());
    let store = MemoryStore::with(vec![crashing, pending]);
    *store.hold_load.lock() = Some(2);
    let h = harness(FakeNotion::with_pages(vec![page()]), sheets, store);
    let store: Arc<dyn SyncStore> = h.store.clone();

    let mut runs = ScheduledRuns::default();
    let started = schedule_due_syncs(&h.engine, store.as_ref(), Utc::now(), &mut runs)
        .await
        .unwrap();
    assert_eq!(started, 2);
    tokio::time::timeout(Duration::from_secs(5), h.store.load_entered.notified())
        .await
        .expect("second run is loading");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while runs.contains(1) {
        assert!(tokio::time::Instant::now() < deadline, "crashed run never reaped");
        tokio::time::sleep(Duration::from_millis(10)).await;
        runs.reap_finished();
    }

    // Sync 2 has not reached the engine yet but is still tracked
    assert!(!h.engine.is_running(2));
    assert!(runs.contains(2));
    assert!(!h.engine.is_running(1));

    *h.sheets.panic_on_sheet.lock() = None;
    let again = schedule_due_syncs(&h.engine, store.as_ref(), Utc::now(), &mut runs)
        .await
        .unwrap();
    assert_eq!(again, 1);

    h.store.release_load.notify_one();
    let mut finished = runs.wait_all().await;
    finished.sort();
    assert_eq!(finished, vec![1, 2]);
    assert!(runs.is_empty());
    assert_eq!(h.logs.phases(2), vec![LogPhase::Started, LogPhase::Completed]);
    assert!(h.store.sync(1).last_sync.is_some());
}

#[tokio::test]
async fn test_scheduler_runs_and_stops_on_signal() {
    let h = harness(
        FakeNotion::with_pages(vec![page()]),
        FakeSheets::default(),
        MemoryStore::with(vec![sync_model(1, "notion_to_sheets")]),
    );
    let store: Arc<dyn SyncStore> = h.store.clone();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = start_sync_scheduler(h.engine.clone(), store, Duration::from_millis(20), shutdown_rx);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while h.store.sync(1).last_sync.is_none() {
        assert!(tokio::time::Instant::now() < deadline, "scheduled run never completed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler stopped")
        .unwrap();

    // Hourly sync ran once; later ticks found it not yet due
    assert_eq!(h.sheets.write_calls.load(Ordering::SeqCst), 1);
}
