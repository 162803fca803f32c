pub mod dbsnap;
pub mod memory;

use std::sync::Arc;

use crate::models::Snapshot;
use dbsnap::DbSnapshots;
use memory::MemorySnapshots;

/// Where snapshots live.
///
/// The durable backend is Postgres; the in-memory backend serves
/// deployments without a configured database and the test suite, which
/// keeps its own handle on the store to observe writes.
pub enum SnapshotBackend {
    Postgres(DbSnapshots),
    Memory(Arc<MemorySnapshots>),
}

impl SnapshotBackend {
    pub async fn load(&self, entity_id: &str) -> Result<Option<Snapshot>, StoreError> {
        match self {
            SnapshotBackend::Postgres(db) => db.load_snapshot(entity_id).await,
            SnapshotBackend::Memory(mem) => Ok(mem.load_snapshot(entity_id).await),
        }
    }

    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        match self {
            SnapshotBackend::Postgres(db) => db.save_snapshot(snapshot).await,
            SnapshotBackend::Memory(mem) => {
                mem.save_snapshot(snapshot).await;
                Ok(())
            }
        }
    }
}

#[derive(Debug)]
pub enum StoreError {
    Database(sqlx::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e)
    }
}
