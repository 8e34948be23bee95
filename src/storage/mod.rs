// SPDX-License-Identifier: MPL-2.0

//! Scan history storage
//!
//! [`ScanStore`] is the persistence contract: atomic durable inserts,
//! newest-first listing and a single all-or-nothing `delete_all`.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryScanStore;
pub use sqlite::SqliteScanStore;

use crate::errors::StorageError;
use crate::model::ScanEvent;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for scan events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Persist a new scan; durable once this returns `Ok`
    async fn insert(&self, event: &ScanEvent) -> Result<(), StorageError>;

    /// All scans, newest `captured_at` first
    async fn list_all(&self) -> Result<Vec<ScanEvent>, StorageError>;

    /// A single scan by id
    async fn get(&self, id: Uuid) -> Result<Option<ScanEvent>, StorageError>;

    async fn count(&self) -> Result<u64, StorageError>;

    /// Remove every scan atomically, returning how many were removed
    async fn delete_all(&self) -> Result<u64, StorageError>;
}
