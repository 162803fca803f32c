use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Aggregated runtime state of the sync service.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct DiagnosticsResponse {
    /// Live WebSocket connections
    pub n_conn: u32,
    /// Rooms with at least one member
    pub n_rooms: u32,
    /// Distinct users online across all organization rooms
    pub n_online_users: u32,
    /// Entities with a pending debounced save
    pub n_pending_saves: u32,
    /// Snapshots currently held in the read-through cache
    pub n_cached_snapshots: u64,
    pub cpu_usage: f32,
    pub memory_alloc: u64,
    pub memory_total: u64,
    pub memory_free: u64,
}
