use std::collections::{HashMap, HashSet};
use std::fmt;
use tokio::sync::RwLock;
use tracing::{error, warn};
use uuid::Uuid;

use crate::models::ServerEvent;
use crate::ws::registry::ConnectionRegistry;

/// A named broadcast domain: (entity kind, entity id).
///
/// For the snapshot-bearing kinds the room name doubles as the
/// persistence key, so `document:A` broadcast and `document:A` storage
/// always refer to the same entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomName {
    Document(String),
    Slide(String),
    Canvas(String),
    Chat(String),
    Org(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomKind {
    Document,
    Slide,
    Canvas,
    Chat,
    Org,
}

impl RoomName {
    pub fn kind(&self) -> RoomKind {
        match self {
            RoomName::Document(_) => RoomKind::Document,
            RoomName::Slide(_) => RoomKind::Slide,
            RoomName::Canvas(_) => RoomKind::Canvas,
            RoomName::Chat(_) => RoomKind::Chat,
            RoomName::Org(_) => RoomKind::Org,
        }
    }

    pub fn entity_id(&self) -> &str {
        match self {
            RoomName::Document(id)
            | RoomName::Slide(id)
            | RoomName::Canvas(id)
            | RoomName::Chat(id)
            | RoomName::Org(id) => id,
        }
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomName::Document(id) => write!(f, "document:{}", id),
            RoomName::Slide(id) => write!(f, "slide:{}", id),
            RoomName::Canvas(id) => write!(f, "canvas:{}", id),
            RoomName::Chat(id) => write!(f, "chat:{}", id),
            RoomName::Org(id) => write!(f, "org:{}", id),
        }
    }
}

/// Room membership and fan-out.
///
/// A room exists exactly as long as it has members: the first join
/// creates the entry, the last leave removes it. Rooms are never
/// persisted.
#[derive(Default)]
pub struct Rooms {
    inner: RwLock<HashMap<RoomName, HashSet<Uuid>>>,
}

impl Rooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Returns false if it was already a member.
    pub async fn join(&self, room: RoomName, connection_id: Uuid) -> bool {
        let mut rooms = self.inner.write().await;
        rooms.entry(room).or_default().insert(connection_id)
    }

    /// Remove a connection from a room, dropping the room once empty.
    pub async fn leave(&self, room: &RoomName, connection_id: Uuid) -> bool {
        let mut rooms = self.inner.write().await;
        let Some(members) = rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(&connection_id);
        if members.is_empty() {
            rooms.remove(room);
        }
        removed
    }

    pub async fn is_member(&self, room: &RoomName, connection_id: Uuid) -> bool {
        self.inner
            .read()
            .await
            .get(room)
            .is_some_and(|members| members.contains(&connection_id))
    }

    pub async fn members(&self, room: &RoomName) -> Vec<Uuid> {
        self.inner
            .read()
            .await
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Deliver an event to every member of a room except `exclude`.
    ///
    /// The event is serialized once and pushed into each member's
    /// outbox. An empty room is a no-op. Returns the delivery count.
    pub async fn emit(
        &self,
        registry: &ConnectionRegistry,
        room: &RoomName,
        exclude: Option<Uuid>,
        event: &ServerEvent,
    ) -> usize {
        let members = {
            let rooms = self.inner.read().await;
            match rooms.get(room) {
                Some(members) => members.iter().copied().collect::<Vec<_>>(),
                None => return 0,
            }
        };

        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize event for room {}: {}", room, e);
                return 0;
            }
        };

        let mut delivered = 0;
        for member in members {
            if Some(member) == exclude {
                continue;
            }
            if registry.push(member, &text).await {
                delivered += 1;
            } else {
                // Member is mid-teardown; its deregistration cleans up.
                warn!("Dropped event for stale connection {}", member);
            }
        }
        delivered
    }

    /// Deliver an event to every member of a room, the sender included.
    /// Chat messages use this so the sender gets its delivery echo.
    pub async fn broadcast_all(
        &self,
        registry: &ConnectionRegistry,
        room: &RoomName,
        event: &ServerEvent,
    ) -> usize {
        self.emit(registry, room, None, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Identity;
    use tokio::sync::mpsc;

    fn identity(user_id: &str) -> Identity {
        Identity {
            user_id: user_id.into(),
            email: format!("{user_id}@example.com"),
            name: user_id.into(),
            organization_id: "org1".into(),
            role: None,
            avatar: None,
        }
    }

    async fn connect(
        registry: &ConnectionRegistry,
        user_id: &str,
    ) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(id, identity(user_id), tx).await;
        (id, rx)
    }

    #[test]
    fn room_names_render_composite_keys() {
        assert_eq!(RoomName::Document("d1".into()).to_string(), "document:d1");
        assert_eq!(RoomName::Slide("s1".into()).to_string(), "slide:s1");
        assert_eq!(RoomName::Canvas("d1".into()).to_string(), "canvas:d1");
        assert_eq!(RoomName::Chat("p1".into()).to_string(), "chat:p1");
        assert_eq!(RoomName::Org("o1".into()).to_string(), "org:o1");
    }

    #[tokio::test]
    async fn room_is_garbage_collected_when_empty() {
        let rooms = Rooms::new();
        let room = RoomName::Document("d1".into());
        let conn = Uuid::new_v4();

        assert!(rooms.join(room.clone(), conn).await);
        assert_eq!(rooms.room_count().await, 1);

        assert!(rooms.leave(&room, conn).await);
        assert_eq!(rooms.room_count().await, 0);

        // Leaving again is harmless.
        assert!(!rooms.leave(&room, conn).await);
    }

    #[tokio::test]
    async fn emit_excludes_sender() {
        let registry = ConnectionRegistry::new();
        let rooms = Rooms::new();
        let room = RoomName::Document("d1".into());

        let (a, mut rx_a) = connect(&registry, "alice").await;
        let (b, mut rx_b) = connect(&registry, "bob").await;
        rooms.join(room.clone(), a).await;
        rooms.join(room.clone(), b).await;

        let event = ServerEvent::UserLeftDocument {
            user_id: "someone".into(),
        };
        let delivered = rooms.emit(&registry, &room, Some(a), &event).await;

        assert_eq!(delivered, 1);
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn emit_is_room_scoped() {
        let registry = ConnectionRegistry::new();
        let rooms = Rooms::new();

        let (a, _rx_a) = connect(&registry, "alice").await;
        let (b, mut rx_b) = connect(&registry, "bob").await;
        rooms.join(RoomName::Document("d1".into()), a).await;
        rooms.join(RoomName::Document("d2".into()), b).await;

        let event = ServerEvent::UserLeftDocument {
            user_id: "alice".into(),
        };
        let delivered = rooms
            .emit(&registry, &RoomName::Document("d1".into()), Some(a), &event)
            .await;

        assert_eq!(delivered, 0);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn emit_to_empty_room_is_noop() {
        let registry = ConnectionRegistry::new();
        let rooms = Rooms::new();
        let event = ServerEvent::UserLeftDocument {
            user_id: "ghost".into(),
        };
        let delivered = rooms
            .emit(
                &registry,
                &RoomName::Document("nobody".into()),
                None,
                &event,
            )
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn broadcast_all_includes_sender() {
        let registry = ConnectionRegistry::new();
        let rooms = Rooms::new();
        let room = RoomName::Chat("p1".into());

        let (a, mut rx_a) = connect(&registry, "alice").await;
        let (b, mut rx_b) = connect(&registry, "bob").await;
        rooms.join(room.clone(), a).await;
        rooms.join(room.clone(), b).await;

        let event = ServerEvent::JoinedChat {
            project_id: "p1".into(),
            room_name: room.to_string(),
        };
        let delivered = rooms.broadcast_all(&registry, &room, &event).await;

        assert_eq!(delivered, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }
}
