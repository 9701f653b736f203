//! Periodic reconciliation picks up writes the feed never reported

mod common;

use common::{loaded, settle, temp_database_url, Stack};
use std::time::Duration;
use tutorq_core::domain::EntryStatus;
use tutorq_core::port::QueueStore;

#[tokio::test]
async fn test_writes_from_another_process_arrive_by_polling() {
    let (url, path) = temp_database_url();
    let dashboard = Stack::open(&url).await;
    // Separate pool and bus, like a second CLI process
    let other = Stack::open(&url).await;

    let handle = dashboard
        .synchronizer(Duration::from_millis(200))
        .activate()
        .await;
    let mut rx = handle.watch();
    assert!(loaded(&handle).await.is_empty());

    let entry = other.store.insert("Carol", Some("pointers")).await.unwrap();
    let state = settle(&mut rx, |s| s.get(&entry.id).is_some()).await;
    assert_eq!(state.waiting_count(), 1);

    other.store.update_status(&entry.id, EntryStatus::Seen).await.unwrap();
    settle(&mut rx, |s| s.seen_count() == 1).await;

    other.store.delete(&entry.id).await.unwrap();
    settle(&mut rx, |s| s.is_empty()).await;

    handle.deactivate().await;
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_refresh_reloads_on_demand() {
    let (url, path) = temp_database_url();
    let dashboard = Stack::open(&url).await;
    let other = Stack::open(&url).await;

    let handle = dashboard
        .synchronizer(Duration::from_secs(3600))
        .activate()
        .await;
    let mut rx = handle.watch();
    loaded(&handle).await;

    let entry = other.store.insert("Dave", None).await.unwrap();
    handle.refresh().await.unwrap();
    let state = settle(&mut rx, |s| s.get(&entry.id).is_some()).await;
    assert_eq!(state.entries.len(), 1);

    handle.deactivate().await;
    let _ = std::fs::remove_file(&path);
}
