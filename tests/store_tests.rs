// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the scan stores

use chrono::{Duration, TimeZone, Utc};
use qrscan::model::{Coordinate, ScanEvent};
use qrscan::storage::{MemoryScanStore, ScanStore, SqliteScanStore};

fn events() -> Vec<ScanEvent> {
    let base = Utc.with_ymd_and_hms(2025, 3, 18, 9, 30, 0).unwrap();
    vec![
        ScanEvent::new("second", base + Duration::seconds(4), None, Some(vec![1, 2, 3])),
        ScanEvent::new(
            "first",
            base,
            Some(Coordinate::new(-33.8688, 151.2093).unwrap()),
            None,
        ),
        ScanEvent::new("third", base + Duration::seconds(9), None, None),
    ]
}

/// Behaviour every store must share
async fn check_store(store: &dyn ScanStore) {
    let events = events();
    for event in &events {
        store.insert(event).await.unwrap();
    }

    let listed = store.list_all().await.unwrap();
    let payloads: Vec<&str> = listed.iter().map(|e| e.payload.as_str()).collect();
    assert_eq!(payloads, vec!["third", "second", "first"]);

    // Every inserted event appears exactly once
    for event in &events {
        assert_eq!(listed.iter().filter(|e| e.id == event.id).count(), 1);
    }
    assert_eq!(store.count().await.unwrap(), 3);

    let first = store.get(events[1].id).await.unwrap().unwrap();
    assert_eq!(first.location, events[1].location);

    assert_eq!(store.delete_all().await.unwrap(), 3);
    assert!(store.list_all().await.unwrap().is_empty());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_memory_store_contract() {
    check_store(&MemoryScanStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteScanStore::open(&dir.path().join("scans.db"))
        .await
        .unwrap();
    check_store(&store).await;
}

/// Two events 400 ns apart are equal once stored, so the later insert lists first
async fn check_sub_microsecond_order(store: &dyn ScanStore) -> Vec<ScanEvent> {
    let base = Utc.with_ymd_and_hms(2025, 3, 18, 9, 30, 0).unwrap();
    let mut first = ScanEvent::new("inserted_first", base, None, None);
    first.captured_at = base + Duration::nanoseconds(1_000_500);
    let mut second = ScanEvent::new("inserted_second", base, None, None);
    second.captured_at = base + Duration::nanoseconds(1_000_100);

    store.insert(&first).await.unwrap();
    store.insert(&second).await.unwrap();

    let listed = store.list_all().await.unwrap();
    let payloads: Vec<&str> = listed.iter().map(|e| e.payload.as_str()).collect();
    assert_eq!(payloads, vec!["inserted_second", "inserted_first"]);
    listed
}

#[tokio::test]
async fn test_stores_agree_below_microseconds() {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = SqliteScanStore::open(&dir.path().join("scans.db"))
        .await
        .unwrap();

    let from_memory = check_sub_microsecond_order(&MemoryScanStore::new()).await;
    let from_sqlite = check_sub_microsecond_order(&sqlite).await;
    let times = |events: &[ScanEvent]| events.iter().map(|e| e.captured_at).collect::<Vec<_>>();
    assert_eq!(times(&from_memory), times(&from_sqlite));
}

#[tokio::test]
async fn test_new_event_round_trips_through_sqlite_unchanged() {
    let store = SqliteScanStore::in_memory().await.unwrap();
    let event = ScanEvent::new("A", Utc::now(), None, Some(vec![1, 2]));
    store.insert(&event).await.unwrap();
    assert_eq!(store.get(event.id).await.unwrap(), Some(event));
}

#[tokio::test]
async fn test_sqlite_history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history").join("scans.db");
    let event = ScanEvent::new("WIFI:S:Cafe;T:WPA;P:secret;;", Utc::now(), None, Some(vec![9; 64]));

    let store = SqliteScanStore::open(&path).await.unwrap();
    store.insert(&event).await.unwrap();
    drop(store);

    let reopened = SqliteScanStore::open(&path).await.unwrap();
    let loaded = reopened.get(event.id).await.unwrap().unwrap();
    assert_eq!(loaded.payload, event.payload);
    assert_eq!(loaded.image.map(|i| i.len()), Some(64));
}
