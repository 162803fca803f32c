use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Latest persisted whole-state blob for one entity.
///
/// At most one snapshot exists per entity id; every flush replaces the
/// blob wholesale. The state itself is opaque to this service: raw text
/// for documents, serialized shape data for canvases, a structured
/// object for slides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub entity_id: String,
    pub state: Value,
    pub updated_at: DateTime<Utc>,
}
