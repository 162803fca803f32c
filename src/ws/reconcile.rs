use serde_json::Value;
use tracing::error;

use crate::models::OnlineUser;
use crate::AppState;

use super::rooms::RoomName;

/// What a joining client needs to start from a consistent base: the
/// latest persisted state plus who is already in the room.
pub struct JoinState {
    pub snapshot: Option<Value>,
    pub participants: Vec<OnlineUser>,
}

/// Resolve the join-time state for a room.
///
/// A missing snapshot means "new entity" and yields `None`, never an
/// error. A store failure is logged and degrades to the empty sentinel.
///
/// Callers must deliver the returned state to the joiner *before*
/// adding it to the room member set: the joiner's outbox is FIFO, so
/// anything queued later (live mutations included) arrives after it.
pub async fn on_join(state: &AppState, room: &RoomName) -> JoinState {
    let snapshot = match state.snapshots.load(room).await {
        Ok(snapshot) => snapshot.map(|s| s.state),
        Err(e) => {
            error!("Failed to load snapshot for {}: {}", room, e);
            None
        }
    };

    // Membership is read before the joiner is added, so the joiner
    // never appears in its own participant list.
    let member_ids = state.rooms.members(room).await;
    let participants = state
        .registry
        .identities(&member_ids)
        .await
        .into_iter()
        .map(|identity| identity.online_user())
        .collect();

    JoinState {
        snapshot,
        participants,
    }
}
