use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::{ErrorCode, Identity, ServerEvent};
use crate::AppState;

use super::rooms::RoomName;

/// Mutations require a prior join; anything else is NOT_IN_ROOM.
async fn ensure_member(state: &AppState, connection_id: Uuid, room: &RoomName) -> bool {
    if state.rooms.is_member(room, connection_id).await {
        return true;
    }
    state
        .registry
        .send_event(
            connection_id,
            &ServerEvent::error(ErrorCode::NotInRoom, format!("Join {} first", room)),
        )
        .await;
    false
}

pub async fn handle_document_update(
    state: &AppState,
    connection_id: Uuid,
    identity: &Identity,
    document_id: String,
    content: String,
) {
    let room = RoomName::Document(document_id.clone());
    if !ensure_member(state, connection_id, &room).await {
        return;
    }

    state
        .rooms
        .emit(
            &state.registry,
            &room,
            Some(connection_id),
            &ServerEvent::DocumentUpdate {
                document_id,
                content: content.clone(),
                updated_by: identity.updated_by(),
            },
        )
        .await;

    state
        .scheduler
        .schedule_save(room, Value::String(content))
        .await;
}

pub async fn handle_canvas_update(
    state: &AppState,
    connection_id: Uuid,
    identity: &Identity,
    document_id: String,
    canvas_data: String,
) {
    let room = RoomName::Canvas(document_id.clone());
    if !ensure_member(state, connection_id, &room).await {
        return;
    }

    state
        .rooms
        .emit(
            &state.registry,
            &room,
            Some(connection_id),
            &ServerEvent::CanvasUpdate {
                document_id,
                canvas_data: canvas_data.clone(),
                updated_by: identity.updated_by(),
            },
        )
        .await;

    // The canvas payload is an opaque serialized shape list; it is
    // persisted as-is under the canvas entity.
    state
        .scheduler
        .schedule_save(room, Value::String(canvas_data))
        .await;
}

pub async fn handle_slide_update(
    state: &AppState,
    connection_id: Uuid,
    identity: &Identity,
    slide_id: String,
    title: Option<String>,
    content: Option<Value>,
) {
    let room = RoomName::Slide(slide_id.clone());
    if !ensure_member(state, connection_id, &room).await {
        return;
    }

    state
        .rooms
        .emit(
            &state.registry,
            &room,
            Some(connection_id),
            &ServerEvent::SlideUpdate {
                slide_id,
                title: title.clone(),
                content: content.clone(),
                updated_by: identity.updated_by(),
            },
        )
        .await;

    let blob = merge_slide_state(state, &room, title, content).await;
    state.scheduler.schedule_save(room, blob).await;
}

/// Build the whole-blob slide state for persistence.
///
/// Slide updates may carry only a title or only content; the absent
/// field keeps its latest known value (pending save first, then the
/// stored snapshot). Storage itself stays whole-blob replacement.
async fn merge_slide_state(
    state: &AppState,
    room: &RoomName,
    title: Option<String>,
    content: Option<Value>,
) -> Value {
    let base = match state.scheduler.pending_state(room).await {
        Some(value) => Some(value),
        None => state
            .snapshots
            .load(room)
            .await
            .ok()
            .flatten()
            .map(|snapshot| snapshot.state),
    };

    let mut slide = match base {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    if let Some(title) = title {
        slide.insert("title".to_string(), Value::String(title));
    }
    if let Some(content) = content {
        slide.insert("content".to_string(), content);
    }

    Value::Object(slide)
}
