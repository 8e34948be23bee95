// SPDX-License-Identifier: MPL-2.0

//! SQLite scan store

use super::ScanStore;
use crate::errors::StorageError;
use crate::model::{Coordinate, ScanEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// Row as stored in the `scans` table
#[derive(Debug, sqlx::FromRow)]
struct ScanRow {
    id: String,
    payload: String,
    /// Microseconds since the Unix epoch
    captured_at: i64,
    latitude: Option<f64>,
    longitude: Option<f64>,
    image: Option<Vec<u8>>,
}

impl ScanRow {
    fn into_event(self) -> Result<ScanEvent, StorageError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| StorageError::InvalidRecord(format!("bad id '{}': {}", self.id, e)))?;
        let captured_at = DateTime::<Utc>::from_timestamp_micros(self.captured_at).ok_or_else(
            || StorageError::InvalidRecord(format!("bad timestamp {}", self.captured_at)),
        )?;
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate {
                latitude,
                longitude,
            }),
            _ => None,
        };

        Ok(ScanEvent {
            id,
            payload: self.payload,
            captured_at,
            location,
            image: self.image,
        })
    }
}

/// SQLite-backed [`ScanStore`]
#[derive(Debug, Clone)]
pub struct SqliteScanStore {
    pool: Pool<Sqlite>,
}

impl SqliteScanStore {
    /// Wrap an existing pool and make sure the schema exists
    pub async fn new(pool: Pool<Sqlite>) -> Result<Self, StorageError> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open (creating if needed) the database file at `path`
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!(path = %path.display(), "Opened scan database");
        Self::new(pool).await
    }

    /// Private in-memory database (for testing)
    pub async fn in_memory() -> Result<Self, StorageError> {
        // Every connection to :memory: is a separate database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::new(pool).await
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scans (
                id TEXT PRIMARY KEY NOT NULL,
                payload TEXT NOT NULL CHECK (length(payload) > 0),
                captured_at INTEGER NOT NULL,
                latitude REAL,
                longitude REAL,
                image BLOB
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_scans_captured_at ON scans(captured_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ScanStore for SqliteScanStore {
    async fn insert(&self, event: &ScanEvent) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO scans (id, payload, captured_at, latitude, longitude, image)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(event.id.to_string())
        .bind(&event.payload)
        .bind(event.captured_at.timestamp_micros())
        .bind(event.location.map(|l| l.latitude))
        .bind(event.location.map(|l| l.longitude))
        .bind(event.image.as_deref())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(id = %event.id, "Scan inserted");
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StorageError::Duplicate(event.id))
            }
            Err(sqlx::Error::Database(db)) if db.is_check_violation() => Err(
                StorageError::InvalidRecord(format!("rejected scan {}: {}", event.id, db)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_all(&self) -> Result<Vec<ScanEvent>, StorageError> {
        let rows: Vec<ScanRow> = sqlx::query_as(
            r#"
            SELECT id, payload, captured_at, latitude, longitude, image
            FROM scans
            ORDER BY captured_at DESC, rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ScanRow::into_event).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<ScanEvent>, StorageError> {
        let row: Option<ScanRow> = sqlx::query_as(
            r#"
            SELECT id, payload, captured_at, latitude, longitude, image
            FROM scans
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ScanRow::into_event).transpose()
    }

    async fn count(&self) -> Result<u64, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scans")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn delete_all(&self) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM scans").execute(&mut *tx).await?;
        tx.commit().await?;

        info!(removed = result.rows_affected(), "Scan history cleared");
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn create_test_store() -> SqliteScanStore {
        SqliteScanStore::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get_preserves_fields() {
        let store = create_test_store().await;
        let event = ScanEvent::new(
            "https://example.com",
            Utc::now(),
            Some(Coordinate::new(40.7128, -74.006).unwrap()),
            Some(vec![0xFF, 0xD8, 0xFF, 0xE0]),
        );

        store.insert(&event).await.unwrap();
        let loaded = store.get(event.id).await.unwrap().unwrap();

        assert_eq!(loaded.id, event.id);
        assert_eq!(loaded.payload, event.payload);
        assert_eq!(
            loaded.captured_at.timestamp_micros(),
            event.captured_at.timestamp_micros()
        );
        assert_eq!(loaded.location, event.location);
        assert_eq!(loaded.image, event.image);
    }

    #[tokio::test]
    async fn test_optional_fields_absent() {
        let store = create_test_store().await;
        let event = ScanEvent::new("plain", Utc::now(), None, None);
        store.insert(&event).await.unwrap();

        let loaded = store.get(event.id).await.unwrap().unwrap();
        assert!(loaded.location.is_none());
        assert!(loaded.image.is_none());
    }

    #[tokio::test]
    async fn test_get_unknown_id() {
        let store = create_test_store().await;
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = create_test_store().await;
        let event = ScanEvent::new("A", Utc::now(), None, None);
        store.insert(&event).await.unwrap();

        assert!(matches!(
            store.insert(&event).await,
            Err(StorageError::Duplicate(id)) if id == event.id
        ));
    }

    #[tokio::test]
    async fn test_empty_payload_rejected_by_schema() {
        let store = create_test_store().await;
        let event = ScanEvent::new("", Utc::now(), None, None);
        assert!(store.insert(&event).await.is_err());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_all_newest_first() {
        let store = create_test_store().await;
        let base = Utc::now();
        for (offset, payload) in [(5, "middle"), (0, "oldest"), (10, "newest")] {
            let event = ScanEvent::new(payload, base + Duration::seconds(offset), None, None);
            store.insert(&event).await.unwrap();
        }

        let payloads: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.payload)
            .collect();
        assert_eq!(payloads, vec!["newest", "middle", "oldest"]);
    }

    #[tokio::test]
    async fn test_delete_all_then_empty() {
        let store = create_test_store().await;
        for payload in ["a", "b"] {
            store
                .insert(&ScanEvent::new(payload, Utc::now(), None, None))
                .await
                .unwrap();
        }

        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert!(store.list_all().await.unwrap().is_empty());
        assert_eq!(store.delete_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_open_creates_file_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scans.db");
        let event = ScanEvent::new("persisted", Utc::now(), None, None);

        {
            let store = SqliteScanStore::open(&path).await.unwrap();
            store.insert(&event).await.unwrap();
            store.pool.close().await;
        }

        let reopened = SqliteScanStore::open(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        assert_eq!(reopened.list_all().await.unwrap()[0].id, event.id);
    }
}
