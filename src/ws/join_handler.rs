use tracing::info;
use uuid::Uuid;

use crate::models::{ErrorCode, Identity, ServerEvent};
use crate::AppState;

use super::reconcile;
use super::registry::JoinOutcome;
use super::rooms::{RoomKind, RoomName};

/// Join a content room (document, slide or canvas).
///
/// The reconciliation response (snapshot + participants) is queued to
/// the joiner before its membership is added, which guarantees the
/// snapshot is delivered ahead of any live mutation for that entity.
pub async fn handle_join_content(
    state: &AppState,
    connection_id: Uuid,
    identity: &Identity,
    room: RoomName,
) {
    let join_state = reconcile::on_join(state, &room).await;

    let ack = match &room {
        RoomName::Document(id) => ServerEvent::JoinedDocument {
            document_id: id.clone(),
            room_name: room.to_string(),
            snapshot: join_state.snapshot,
            participants: join_state.participants,
        },
        RoomName::Slide(id) => ServerEvent::JoinedSlide {
            slide_id: id.clone(),
            room_name: room.to_string(),
            snapshot: join_state.snapshot,
            participants: join_state.participants,
        },
        RoomName::Canvas(id) => ServerEvent::JoinedCanvas {
            document_id: id.clone(),
            room_name: room.to_string(),
            snapshot: join_state.snapshot,
            participants: join_state.participants,
        },
        // Org and chat rooms have their own join paths.
        _ => return,
    };

    match state.registry.join_room(connection_id, room.clone()).await {
        JoinOutcome::UnknownConnection => return,
        JoinOutcome::AlreadyMember => {
            // Re-join of the current room: just refresh the client.
            state.registry.send_event(connection_id, &ack).await;
            return;
        }
        JoinOutcome::Joined { replaced } => {
            if let Some(previous) = replaced {
                leave_content_room(state, connection_id, identity, &previous).await;
            }

            state.registry.send_event(connection_id, &ack).await;
            state.rooms.join(room.clone(), connection_id).await;

            if room.kind() == RoomKind::Document {
                state
                    .rooms
                    .emit(
                        &state.registry,
                        &room,
                        Some(connection_id),
                        &ServerEvent::UserJoinedDocument(identity.online_user()),
                    )
                    .await;
            }

            info!("User {} joined {}", identity.email, room);
        }
    }
}

/// Remove a connection from a content room and tell the peers.
pub async fn leave_content_room(
    state: &AppState,
    connection_id: Uuid,
    identity: &Identity,
    room: &RoomName,
) {
    if !state.rooms.leave(room, connection_id).await {
        return;
    }
    if room.kind() == RoomKind::Document {
        state
            .rooms
            .emit(
                &state.registry,
                room,
                Some(connection_id),
                &ServerEvent::UserLeftDocument {
                    user_id: identity.user_id.clone(),
                },
            )
            .await;
    }
}

/// Join an organization room for presence.
pub async fn handle_join_organization(
    state: &AppState,
    connection_id: Uuid,
    identity: &Identity,
    organization_id: String,
) {
    if organization_id.is_empty() {
        state
            .registry
            .send_event(
                connection_id,
                &ServerEvent::error(ErrorCode::InvalidPayload, "organizationId is required"),
            )
            .await;
        return;
    }

    // Presence is scoped to the caller's own organization; a token for
    // org A cannot observe who is online in org B.
    if identity.organization_id != organization_id {
        state
            .registry
            .send_event(
                connection_id,
                &ServerEvent::error(
                    ErrorCode::AccessDenied,
                    "Not a member of this organization",
                ),
            )
            .await;
        return;
    }

    let room = RoomName::Org(organization_id.clone());

    match state.registry.join_room(connection_id, room.clone()).await {
        JoinOutcome::UnknownConnection => return,
        JoinOutcome::AlreadyMember => {
            // Same org re-joined: resend the current online set without
            // touching the refcount.
            let member_ids = state.rooms.members(&room).await;
            let online_users = state
                .registry
                .identities(&member_ids)
                .await
                .into_iter()
                .filter(|peer| peer.user_id != identity.user_id)
                .map(|peer| peer.online_user())
                .collect();
            state
                .registry
                .send_event(
                    connection_id,
                    &ServerEvent::JoinedOrganization {
                        organization_id,
                        room_name: room.to_string(),
                        online_users,
                    },
                )
                .await;
            return;
        }
        JoinOutcome::Joined { replaced } => {
            if let Some(previous) = replaced {
                leave_org_room(state, connection_id, identity, &previous).await;
            }

            let (became_online, online_users) = state
                .presence
                .join(&organization_id, identity.online_user())
                .await;

            state
                .registry
                .send_event(
                    connection_id,
                    &ServerEvent::JoinedOrganization {
                        organization_id: organization_id.clone(),
                        room_name: room.to_string(),
                        online_users,
                    },
                )
                .await;

            state.rooms.join(room.clone(), connection_id).await;

            if became_online {
                state
                    .rooms
                    .emit(
                        &state.registry,
                        &room,
                        Some(connection_id),
                        &ServerEvent::UserOnline(identity.online_user()),
                    )
                    .await;
            }

            info!(
                "User {} joined org {} (room: {})",
                identity.email, organization_id, room
            );
        }
    }
}

/// Remove a connection from an org room, notifying the remaining
/// members when the user's last connection is gone.
pub async fn leave_org_room(
    state: &AppState,
    connection_id: Uuid,
    identity: &Identity,
    room: &RoomName,
) {
    state.rooms.leave(room, connection_id).await;

    let RoomName::Org(org_id) = room else { return };
    if state.presence.leave(org_id, &identity.user_id).await {
        state
            .rooms
            .emit(
                &state.registry,
                room,
                Some(connection_id),
                &ServerEvent::UserOffline {
                    user_id: identity.user_id.clone(),
                },
            )
            .await;
    }
}
