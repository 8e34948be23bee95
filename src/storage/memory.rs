// SPDX-License-Identifier: MPL-2.0

//! In-memory scan store

use super::ScanStore;
use crate::errors::StorageError;
use crate::model::{ScanEvent, stored_precision};
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Volatile [`ScanStore`] with the same ordering rules as the SQLite store
#[derive(Debug, Default)]
pub struct MemoryScanStore {
    events: RwLock<Vec<ScanEvent>>,
}

impl MemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScanStore for MemoryScanStore {
    async fn insert(&self, event: &ScanEvent) -> Result<(), StorageError> {
        if event.payload.is_empty() {
            return Err(StorageError::InvalidRecord("empty payload".into()));
        }
        let mut events = self.events.write().await;
        if events.iter().any(|e| e.id == event.id) {
            return Err(StorageError::Duplicate(event.id));
        }
        let mut stored = event.clone();
        stored.captured_at = stored_precision(stored.captured_at);
        events.push(stored);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ScanEvent>, StorageError> {
        // Latest insert first among equal timestamps, matching the SQLite rowid tiebreak
        let mut events: Vec<ScanEvent> = self.events.read().await.iter().rev().cloned().collect();
        events.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
        Ok(events)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ScanEvent>, StorageError> {
        Ok(self.events.read().await.iter().find(|e| e.id == id).cloned())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(self.events.read().await.len() as u64)
    }

    async fn delete_all(&self) -> Result<u64, StorageError> {
        let mut events = self.events.write().await;
        let removed = events.len() as u64;
        events.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = MemoryScanStore::new();
        let now = Utc::now();
        let older = ScanEvent::new("old", now - Duration::seconds(10), None, None);
        let newer = ScanEvent::new("new", now, None, None);

        store.insert(&newer).await.unwrap();
        store.insert(&older).await.unwrap();

        let listed = store.list_all().await.unwrap();
        assert_eq!(listed[0].payload, "new");
        assert_eq!(listed[1].payload, "old");
    }

    #[tokio::test]
    async fn test_timestamps_kept_to_microseconds() {
        let store = MemoryScanStore::new();
        let mut event = ScanEvent::new("A", Utc::now(), None, None);
        event.captured_at = chrono::DateTime::from_timestamp(1_742_290_200, 999_999_999).unwrap();
        store.insert(&event).await.unwrap();

        let loaded = store.get(event.id).await.unwrap().unwrap();
        assert_eq!(loaded.captured_at.timestamp_subsec_nanos(), 999_999_000);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = MemoryScanStore::new();
        let event = ScanEvent::new("A", Utc::now(), None, None);
        store.insert(&event).await.unwrap();
        assert!(matches!(
            store.insert(&event).await,
            Err(StorageError::Duplicate(id)) if id == event.id
        ));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_all_reports_count() {
        let store = MemoryScanStore::new();
        for payload in ["a", "b", "c"] {
            store
                .insert(&ScanEvent::new(payload, Utc::now(), None, None))
                .await
                .unwrap();
        }
        assert_eq!(store.delete_all().await.unwrap(), 3);
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
