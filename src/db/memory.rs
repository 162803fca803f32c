use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::models::Snapshot;

/// In-memory snapshot store.
///
/// Used when no DB_URL is configured (the service runs degraded rather
/// than refusing to start) and by the test suite. Tracks the number of
/// writes so tests can assert debounce coalescing.
#[derive(Default)]
pub struct MemorySnapshots {
    entries: RwLock<HashMap<String, Snapshot>>,
    saves: AtomicU64,
}

impl MemorySnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load_snapshot(&self, entity_id: &str) -> Option<Snapshot> {
        self.entries.read().await.get(entity_id).cloned()
    }

    pub async fn save_snapshot(&self, snapshot: &Snapshot) {
        self.saves.fetch_add(1, Ordering::Relaxed);
        self.entries
            .write()
            .await
            .insert(snapshot.entity_id.clone(), snapshot.clone());
    }

    /// Total number of writes accepted since startup.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
