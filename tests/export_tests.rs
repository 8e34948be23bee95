// SPDX-License-Identifier: MPL-2.0

//! Integration tests for history export

use chrono::Utc;
use qrscan::errors::ExportError;
use qrscan::export::{discard_export, export_scans, latest_export};
use qrscan::model::{Coordinate, ScanEvent};
use qrscan::storage::{ScanStore, SqliteScanStore};

#[tokio::test]
async fn test_export_stored_history() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteScanStore::open(&dir.path().join("scans.db"))
        .await
        .unwrap();
    let here = Coordinate::new(35.6762, 139.6503).unwrap();
    store
        .insert(&ScanEvent::new("tel:+81312345678", Utc::now(), Some(here), None))
        .await
        .unwrap();
    store
        .insert(&ScanEvent::new("line one\nline two", Utc::now(), None, None))
        .await
        .unwrap();

    let exports = dir.path().join("exports");
    let summary = export_scans(store.list_all().await.unwrap(), exports.clone())
        .await
        .unwrap();
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.images, 0);

    let mut reader = csv::Reader::from_path(&summary.csv_path).unwrap();
    let payloads: Vec<String> = reader
        .records()
        .map(|r| r.unwrap()[1].to_string())
        .collect();
    assert!(payloads.contains(&"line one\nline two".to_string()));
    assert!(payloads.contains(&"tel:+81312345678".to_string()));

    assert_eq!(latest_export(&exports), Some(summary.directory.clone()));
    discard_export(&summary.directory).unwrap();
    assert!(latest_export(&exports).is_none());
}

#[tokio::test]
async fn test_empty_history_has_nothing_to_export() {
    let dir = tempfile::tempdir().unwrap();
    let result = export_scans(Vec::new(), dir.path().to_path_buf()).await;
    assert!(matches!(result, Err(ExportError::NothingToExport)));
    assert!(latest_export(dir.path()).is_none());
}
