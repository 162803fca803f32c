use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::ErrorCode;

/// Chat message body as supplied by the client.
///
/// Note there is no sender field here: the sender identity is attached
/// server-side from the authenticated connection, never taken from the
/// client payload.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    pub id: String,
    pub content: String,
    pub timestamp: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSender {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
}

/// One online identity as seen by presence consumers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub user_id: String,
    pub email: String,
    pub name: String,
}

/// Attribution attached to every rebroadcast mutation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedBy {
    pub user_id: String,
    pub email: String,
    pub name: String,
}

/// Every event a client may send over the WebSocket connection.
///
/// The wire format is a JSON envelope `{"event": "...", "data": {...}}`.
/// Payloads are validated here, at the boundary; nothing downstream
/// handles untyped blobs.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "join-document", rename_all = "camelCase")]
    JoinDocument { document_id: String },

    #[serde(rename = "join-slide", rename_all = "camelCase")]
    JoinSlide { slide_id: String },

    #[serde(rename = "join-canvas", rename_all = "camelCase")]
    JoinCanvas { document_id: String },

    #[serde(rename = "join-organization", rename_all = "camelCase")]
    JoinOrganization { organization_id: String },

    #[serde(rename = "join-chat", rename_all = "camelCase")]
    JoinChat { project_id: String },

    #[serde(rename = "leave-chat", rename_all = "camelCase")]
    LeaveChat { project_id: String },

    #[serde(rename = "document-update", rename_all = "camelCase")]
    DocumentUpdate { document_id: String, content: String },

    /// Partial update: absent fields keep their current value. Storage
    /// still replaces the whole blob at flush time.
    #[serde(rename = "slide-update", rename_all = "camelCase")]
    SlideUpdate {
        slide_id: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        content: Option<Value>,
    },

    #[serde(rename = "canvas-update", rename_all = "camelCase")]
    CanvasUpdate { document_id: String, canvas_data: String },

    #[serde(rename = "chat:send", rename_all = "camelCase")]
    ChatSend {
        project_id: String,
        message: ChatMessagePayload,
    },

    #[serde(rename = "ping")]
    Ping,
}

/// Every event the server may deliver to a client.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Join acknowledgement for a document room. `snapshot` is `null`
    /// for a new entity; `participants` lists the members present at
    /// join time (the joiner excluded).
    #[serde(rename = "joined-document", rename_all = "camelCase")]
    JoinedDocument {
        document_id: String,
        room_name: String,
        snapshot: Option<Value>,
        participants: Vec<OnlineUser>,
    },

    #[serde(rename = "joined-slide", rename_all = "camelCase")]
    JoinedSlide {
        slide_id: String,
        room_name: String,
        snapshot: Option<Value>,
        participants: Vec<OnlineUser>,
    },

    #[serde(rename = "joined-canvas", rename_all = "camelCase")]
    JoinedCanvas {
        document_id: String,
        room_name: String,
        snapshot: Option<Value>,
        participants: Vec<OnlineUser>,
    },

    #[serde(rename = "user-joined-document")]
    UserJoinedDocument(OnlineUser),

    #[serde(rename = "user-left-document", rename_all = "camelCase")]
    UserLeftDocument { user_id: String },

    #[serde(rename = "joined-organization", rename_all = "camelCase")]
    JoinedOrganization {
        organization_id: String,
        room_name: String,
        online_users: Vec<OnlineUser>,
    },

    #[serde(rename = "user-online")]
    UserOnline(OnlineUser),

    #[serde(rename = "user-offline", rename_all = "camelCase")]
    UserOffline { user_id: String },

    #[serde(rename = "joined-chat", rename_all = "camelCase")]
    JoinedChat {
        project_id: String,
        room_name: String,
    },

    #[serde(rename = "message:new", rename_all = "camelCase")]
    MessageNew {
        id: String,
        sender: ChatSender,
        content: String,
        timestamp: String,
    },

    #[serde(rename = "document-update", rename_all = "camelCase")]
    DocumentUpdate {
        document_id: String,
        content: String,
        updated_by: UpdatedBy,
    },

    #[serde(rename = "slide-update", rename_all = "camelCase")]
    SlideUpdate {
        slide_id: String,
        title: Option<String>,
        content: Option<Value>,
        updated_by: UpdatedBy,
    },

    #[serde(rename = "canvas-update", rename_all = "camelCase")]
    CanvasUpdate {
        document_id: String,
        canvas_data: String,
        updated_by: UpdatedBy,
    },

    #[serde(rename = "pong", rename_all = "camelCase")]
    Pong { date: String },

    #[serde(rename = "error", rename_all = "camelCase")]
    Error { code: ErrorCode, message: String },
}

impl ServerEvent {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_join_document_decodes() {
        let json = r#"{"event":"join-document","data":{"documentId":"doc-1"}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::JoinDocument { document_id } => assert_eq!(document_id, "doc-1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn client_event_slide_update_partial_fields() {
        let json = r#"{"event":"slide-update","data":{"slideId":"s1","title":"New title"}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::SlideUpdate {
                slide_id,
                title,
                content,
            } => {
                assert_eq!(slide_id, "s1");
                assert_eq!(title.as_deref(), Some("New title"));
                assert!(content.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn client_event_chat_send_ignores_forged_sender() {
        // An injected sender field must not survive the decode boundary.
        let json = r#"{"event":"chat:send","data":{"projectId":"p1","message":{"id":"m1","content":"hi","timestamp":"2024-01-01T00:00:00Z","sender":{"id":"evil"}}}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::ChatSend { project_id, message } => {
                assert_eq!(project_id, "p1");
                assert_eq!(message.content, "hi");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn client_event_ping_without_data() {
        let event: ClientEvent = serde_json::from_str(r#"{"event":"ping"}"#).unwrap();
        assert!(matches!(event, ClientEvent::Ping));
    }

    #[test]
    fn client_event_rejects_unknown_event_name() {
        let result = serde_json::from_str::<ClientEvent>(r#"{"event":"drop-tables","data":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn server_event_joined_document_shape() {
        let event = ServerEvent::JoinedDocument {
            document_id: "doc-1".into(),
            room_name: "document:doc-1".into(),
            snapshot: Some(Value::String("hello".into())),
            participants: vec![],
        };
        let json: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "joined-document");
        assert_eq!(json["data"]["documentId"], "doc-1");
        assert_eq!(json["data"]["roomName"], "document:doc-1");
        assert_eq!(json["data"]["snapshot"], "hello");
    }

    #[test]
    fn server_event_user_online_is_flat_user() {
        let event = ServerEvent::UserOnline(OnlineUser {
            user_id: "u1".into(),
            email: "u1@example.com".into(),
            name: "User One".into(),
        });
        let json: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "user-online");
        assert_eq!(json["data"]["userId"], "u1");
        assert_eq!(json["data"]["email"], "u1@example.com");
    }

    #[test]
    fn server_event_error_code_is_screaming_snake() {
        let event = ServerEvent::error(ErrorCode::NotInRoom, "Join the document first");
        let json: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["data"]["code"], "NOT_IN_ROOM");
    }
}
