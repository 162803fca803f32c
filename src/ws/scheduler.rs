use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::services::snapshot_service::SnapshotService;
use crate::ws::rooms::RoomName;

struct PendingSave {
    /// Freshest state for this entity; replaced on every reschedule so
    /// the flush always writes the latest mutation's result.
    state: Value,
    /// Bumped on every reschedule. A timer that wakes with a stale
    /// generation has been superseded and dissolves without writing.
    generation: u64,
}

struct SchedulerInner {
    snapshots: Arc<SnapshotService>,
    delay: Duration,
    pending: Mutex<HashMap<RoomName, PendingSave>>,
}

/// Per-entity debounced persistence.
///
/// Every mutation (re)arms the entity's timer with the latest state.
/// Only when the delay elapses without another mutation does a single
/// write reach the snapshot store, bounding writes to one per quiet
/// interval per entity no matter how fast mutations arrive. A failed
/// save is logged and dropped; the next mutation reschedules a fresh
/// attempt.
#[derive(Clone)]
pub struct SaveScheduler {
    inner: Arc<SchedulerInner>,
}

impl SaveScheduler {
    pub fn new(snapshots: Arc<SnapshotService>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                snapshots,
                delay,
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Arm (or re-arm) the debounce timer for an entity with its latest
    /// state.
    pub async fn schedule_save(&self, entity: RoomName, state: Value) {
        let generation = {
            let mut pending = self.inner.pending.lock().await;
            let entry = pending.entry(entity.clone()).or_insert(PendingSave {
                state: Value::Null,
                generation: 0,
            });
            entry.state = state;
            entry.generation += 1;
            entry.generation
        };

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;

            let due = {
                let mut pending = inner.pending.lock().await;
                let current = pending.get(&entity).map(|entry| entry.generation);
                if current == Some(generation) {
                    pending.remove(&entity).map(|entry| entry.state)
                } else {
                    // Superseded or already flushed.
                    None
                }
            };

            if let Some(state) = due {
                debug!("Debounce elapsed for {}, flushing", entity);
                if let Err(e) = inner.snapshots.save(&entity, state).await {
                    // Swallowed here: the broadcast path must not care,
                    // and the next mutation reschedules a retry.
                    error!("Failed to persist snapshot for {}: {}", entity, e);
                }
            }
        });
    }

    /// Latest unflushed state for an entity, if a save is pending.
    pub async fn pending_state(&self, entity: &RoomName) -> Option<Value> {
        let pending = self.inner.pending.lock().await;
        pending.get(entity).map(|entry| entry.state.clone())
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.pending.lock().await.len()
    }

    /// Write out everything still pending, best effort. Called on
    /// graceful shutdown; timers that wake afterwards find the arena
    /// empty and dissolve.
    pub async fn flush_all(&self) {
        let drained: Vec<(RoomName, Value)> = {
            let mut pending = self.inner.pending.lock().await;
            pending
                .drain()
                .map(|(entity, entry)| (entity, entry.state))
                .collect()
        };

        if drained.is_empty() {
            return;
        }

        info!("Flushing {} pending snapshot(s) on shutdown", drained.len());
        for (entity, state) in drained {
            if let Err(e) = self.inner.snapshots.save(&entity, state).await {
                error!("Shutdown flush failed for {}: {}", entity, e);
            }
        }
    }
}
