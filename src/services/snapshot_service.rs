use chrono::Utc;
use moka::future::Cache;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::db::{SnapshotBackend, StoreError};
use crate::models::Snapshot;
use crate::ws::rooms::RoomName;

/// Read-through cache in front of the snapshot backend.
///
/// Joins are far more frequent than flushes, so loaded snapshots stay
/// cached until idle-expired; every successful save refreshes the cache
/// entry so late joiners observe the flushed state without a store
/// round-trip.
pub struct SnapshotService {
    backend: SnapshotBackend,
    cache: Cache<String, Snapshot>,
}

impl SnapshotService {
    pub fn new(backend: SnapshotBackend, cache_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(100_000)
            .time_to_idle(cache_ttl)
            .build();
        Self { backend, cache }
    }

    /// Load the latest snapshot for an entity.
    ///
    /// A missing snapshot is the normal "new entity" case and returns
    /// `Ok(None)`, never an error.
    pub async fn load(&self, entity: &RoomName) -> Result<Option<Snapshot>, StoreError> {
        let key = entity.to_string();

        if let Some(snapshot) = self.cache.get(&key).await {
            return Ok(Some(snapshot));
        }

        match self.backend.load(&key).await? {
            Some(snapshot) => {
                self.cache.insert(key, snapshot.clone()).await;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Persist the latest state for an entity, replacing any prior blob.
    pub async fn save(&self, entity: &RoomName, state: Value) -> Result<(), StoreError> {
        let key = entity.to_string();
        let snapshot = Snapshot {
            entity_id: key.clone(),
            state,
            updated_at: Utc::now(),
        };

        self.backend.save(&snapshot).await?;
        self.cache.insert(key.clone(), snapshot).await;
        debug!("Persisted snapshot for entity {}", key);
        Ok(())
    }

    /// Number of snapshots currently cached.
    pub fn cached_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemorySnapshots;

    fn service() -> SnapshotService {
        SnapshotService::new(
            SnapshotBackend::Memory(std::sync::Arc::new(MemorySnapshots::new())),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn load_missing_entity_is_none_not_error() {
        let service = service();
        let room = RoomName::Document("d1".into());
        assert!(service.load(&room).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_returns_latest_state() {
        let service = service();
        let room = RoomName::Document("d1".into());

        service
            .save(&room, Value::String("hello".into()))
            .await
            .unwrap();
        service
            .save(&room, Value::String("hello world".into()))
            .await
            .unwrap();

        let snapshot = service.load(&room).await.unwrap().unwrap();
        assert_eq!(snapshot.entity_id, "document:d1");
        assert_eq!(snapshot.state, Value::String("hello world".into()));
    }

    #[tokio::test]
    async fn entities_do_not_collide_across_kinds() {
        let service = service();
        service
            .save(&RoomName::Document("x".into()), Value::String("text".into()))
            .await
            .unwrap();
        service
            .save(&RoomName::Canvas("x".into()), Value::String("[]".into()))
            .await
            .unwrap();

        let doc = service
            .load(&RoomName::Document("x".into()))
            .await
            .unwrap()
            .unwrap();
        let canvas = service
            .load(&RoomName::Canvas("x".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.state, Value::String("text".into()));
        assert_eq!(canvas.state, Value::String("[]".into()));
    }
}
