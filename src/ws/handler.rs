use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::{ClientEvent, ErrorCode, Identity, ServerEvent};
use crate::services::auth_service::{self, AuthError};
use crate::AppState;

use super::rooms::RoomName;
use super::{chat_handler, join_handler, update_handler};

/// WebSocket endpoint.
///
/// Authentication happens here, before the upgrade completes: a
/// missing or invalid credential refuses the connection outright, so
/// no room operation is ever reachable unauthenticated.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let token = auth_service::extract_token(params.get("token").map(String::as_str), &headers);

    let Some(token) = token else {
        warn!("Connection rejected: no token provided");
        return (StatusCode::UNAUTHORIZED, "Authentication required").into_response();
    };

    let identity = match state.verifier.verify(&token) {
        Ok(identity) => identity,
        Err(AuthError::SecretNotConfigured) => {
            error!("JWT secret not configured");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Server misconfigured").into_response();
        }
        Err(e) => {
            warn!("Connection rejected: {}", e);
            return (StatusCode::UNAUTHORIZED, "Invalid or expired token").into_response();
        }
    };

    info!("User authenticated: {}", identity.email);
    ws.on_upgrade(move |socket| handle_socket(socket, identity, state))
}

/// Handle one established WebSocket connection.
async fn handle_socket(socket: WebSocket, identity: Identity, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    info!(
        "Client connected: {} (user: {})",
        connection_id, identity.email
    );

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // All deliveries to this client are queued here and drained by a
    // single writer task, so per-sender ordering is preserved.
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<String>();
    state
        .registry
        .register(connection_id, identity.clone(), outbox_tx)
        .await;

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = outbox_rx.recv().await {
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_identity = identity.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = ws_receiver.next().await {
            match message {
                Message::Text(text) => {
                    dispatch(&recv_state, connection_id, &recv_identity, &text).await;
                }
                Message::Close(_) => break,
                // Protocol-level ping/pong is handled by the transport.
                _ => {}
            }
        }
    });

    // Whichever side finishes first tears down the other.
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    disconnect(&state, connection_id).await;
    info!("Client disconnected: {}", connection_id);
}

/// Decode and route one incoming event.
///
/// Failures are strictly per-message: a payload that does not parse is
/// answered with an error event and the connection lives on.
async fn dispatch(state: &AppState, connection_id: Uuid, identity: &Identity, text: &str) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!("Malformed payload from {}: {}", connection_id, e);
            state
                .registry
                .send_event(
                    connection_id,
                    &ServerEvent::error(ErrorCode::InvalidPayload, "Malformed event payload"),
                )
                .await;
            return;
        }
    };

    match event {
        ClientEvent::JoinDocument { document_id } => {
            join_handler::handle_join_content(
                state,
                connection_id,
                identity,
                RoomName::Document(document_id),
            )
            .await;
        }
        ClientEvent::JoinSlide { slide_id } => {
            join_handler::handle_join_content(
                state,
                connection_id,
                identity,
                RoomName::Slide(slide_id),
            )
            .await;
        }
        ClientEvent::JoinCanvas { document_id } => {
            join_handler::handle_join_content(
                state,
                connection_id,
                identity,
                RoomName::Canvas(document_id),
            )
            .await;
        }
        ClientEvent::JoinOrganization { organization_id } => {
            join_handler::handle_join_organization(state, connection_id, identity, organization_id)
                .await;
        }
        ClientEvent::JoinChat { project_id } => {
            chat_handler::handle_join_chat(state, connection_id, identity, project_id).await;
        }
        ClientEvent::LeaveChat { project_id } => {
            chat_handler::handle_leave_chat(state, connection_id, identity, project_id).await;
        }
        ClientEvent::DocumentUpdate {
            document_id,
            content,
        } => {
            update_handler::handle_document_update(
                state,
                connection_id,
                identity,
                document_id,
                content,
            )
            .await;
        }
        ClientEvent::SlideUpdate {
            slide_id,
            title,
            content,
        } => {
            update_handler::handle_slide_update(
                state,
                connection_id,
                identity,
                slide_id,
                title,
                content,
            )
            .await;
        }
        ClientEvent::CanvasUpdate {
            document_id,
            canvas_data,
        } => {
            update_handler::handle_canvas_update(
                state,
                connection_id,
                identity,
                document_id,
                canvas_data,
            )
            .await;
        }
        ClientEvent::ChatSend {
            project_id,
            message,
        } => {
            chat_handler::handle_chat_send(state, connection_id, identity, project_id, message)
                .await;
        }
        ClientEvent::Ping => {
            state
                .registry
                .send_event(
                    connection_id,
                    &ServerEvent::Pong {
                        date: Utc::now().to_rfc3339(),
                    },
                )
                .await;
        }
    }
}

/// Tear down all state for a connection.
///
/// Safe to call more than once: the registry hands out the membership
/// list exactly once, so a transport close racing an explicit logout
/// cannot double-send leave notifications.
pub async fn disconnect(state: &AppState, connection_id: Uuid) {
    let Some((identity, rooms)) = state.registry.deregister(connection_id).await else {
        return;
    };

    for room in rooms {
        match room {
            RoomName::Org(_) => {
                join_handler::leave_org_room(state, connection_id, &identity, &room).await;
            }
            RoomName::Chat(_) => {
                state.rooms.leave(&room, connection_id).await;
            }
            _ => {
                join_handler::leave_content_room(state, connection_id, &identity, &room).await;
            }
        }
    }
}
