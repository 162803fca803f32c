use tracing::info;
use uuid::Uuid;

use crate::models::{ChatMessagePayload, ErrorCode, Identity, ServerEvent};
use crate::AppState;

use super::registry::JoinOutcome;
use super::rooms::RoomName;

pub async fn handle_join_chat(
    state: &AppState,
    connection_id: Uuid,
    identity: &Identity,
    project_id: String,
) {
    if project_id.is_empty() {
        state
            .registry
            .send_event(
                connection_id,
                &ServerEvent::error(ErrorCode::InvalidPayload, "projectId is required"),
            )
            .await;
        return;
    }

    let room = RoomName::Chat(project_id.clone());

    match state.registry.join_room(connection_id, room.clone()).await {
        JoinOutcome::UnknownConnection => return,
        JoinOutcome::AlreadyMember | JoinOutcome::Joined { .. } => {
            state.rooms.join(room.clone(), connection_id).await;
            state
                .registry
                .send_event(
                    connection_id,
                    &ServerEvent::JoinedChat {
                        project_id: project_id.clone(),
                        room_name: room.to_string(),
                    },
                )
                .await;
            info!(
                "User {} joined chat for project {} (room: {})",
                identity.email, project_id, room
            );
        }
    }
}

pub async fn handle_leave_chat(
    state: &AppState,
    connection_id: Uuid,
    identity: &Identity,
    project_id: String,
) {
    let room = RoomName::Chat(project_id.clone());
    state.registry.leave_room(connection_id, &room).await;
    state.rooms.leave(&room, connection_id).await;
    info!(
        "User {} left chat for project {}",
        identity.email, project_id
    );
}

/// Broadcast a chat message to the whole room, the sender included (the
/// echo doubles as the sender's delivery confirmation).
///
/// The sender identity on the outgoing message is always the
/// connection's verified identity; nothing from the client payload can
/// impersonate another user.
pub async fn handle_chat_send(
    state: &AppState,
    connection_id: Uuid,
    identity: &Identity,
    project_id: String,
    message: ChatMessagePayload,
) {
    if project_id.is_empty() {
        state
            .registry
            .send_event(
                connection_id,
                &ServerEvent::error(ErrorCode::InvalidPayload, "projectId is required"),
            )
            .await;
        return;
    }

    let room = RoomName::Chat(project_id.clone());

    state
        .rooms
        .broadcast_all(
            &state.registry,
            &room,
            &ServerEvent::MessageNew {
                id: message.id,
                sender: identity.chat_sender(),
                content: message.content,
                timestamp: message.timestamp,
            },
        )
        .await;

    info!(
        "Chat message sent by {} in project {}",
        identity.email, project_id
    );
}
