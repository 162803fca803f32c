use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::models::{Identity, ServerEvent};
use crate::ws::rooms::{RoomKind, RoomName};

/// One live client session.
struct ConnectionEntry {
    identity: Identity,
    /// Pre-serialized frames queued for the connection's writer task.
    /// The channel preserves per-sender FIFO into this receiver.
    outbox: mpsc::UnboundedSender<String>,
    rooms: HashSet<RoomName>,
}

/// Outcome of a room-membership request for a connection.
#[derive(Debug, PartialEq)]
pub enum JoinOutcome {
    /// Membership added. If joining displaced another room of the same
    /// kind (a client edits one document at a time), it is returned so
    /// the caller can tear it down.
    Joined { replaced: Option<RoomName> },
    AlreadyMember,
    UnknownConnection,
}

/// Tracks live connections, their identities and room memberships.
///
/// Constructed once in main and injected through the application state;
/// membership here is the authoritative per-connection view used for
/// disconnect teardown, while `Rooms` holds the per-room view used for
/// fan-out. The WS handler keeps the two in step.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<HashMap<Uuid, ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        connection_id: Uuid,
        identity: Identity,
        outbox: mpsc::UnboundedSender<String>,
    ) {
        let mut connections = self.inner.write().await;
        connections.insert(
            connection_id,
            ConnectionEntry {
                identity,
                outbox,
                rooms: HashSet::new(),
            },
        );
    }

    /// Remove a connection, returning its identity and memberships for
    /// teardown. Idempotent: a second call finds nothing and does
    /// nothing, so close and explicit logout cannot double-notify.
    pub async fn deregister(&self, connection_id: Uuid) -> Option<(Identity, Vec<RoomName>)> {
        let mut connections = self.inner.write().await;
        connections.remove(&connection_id).map(|entry| {
            info!("Connection {} deregistered", connection_id);
            (entry.identity, entry.rooms.into_iter().collect())
        })
    }

    pub async fn identity(&self, connection_id: Uuid) -> Option<Identity> {
        let connections = self.inner.read().await;
        connections.get(&connection_id).map(|e| e.identity.clone())
    }

    /// Resolve a set of connection ids to their identities, skipping
    /// any that disconnected in the meantime.
    pub async fn identities(&self, connection_ids: &[Uuid]) -> Vec<Identity> {
        let connections = self.inner.read().await;
        connection_ids
            .iter()
            .filter_map(|id| connections.get(id).map(|e| e.identity.clone()))
            .collect()
    }

    /// Record a room membership for a connection.
    ///
    /// Content rooms (document/slide/canvas) and the org room are held
    /// one-per-kind: joining a second document implicitly displaces the
    /// first. Chat rooms accumulate freely.
    pub async fn join_room(&self, connection_id: Uuid, room: RoomName) -> JoinOutcome {
        let mut connections = self.inner.write().await;
        let Some(entry) = connections.get_mut(&connection_id) else {
            return JoinOutcome::UnknownConnection;
        };

        if entry.rooms.contains(&room) {
            return JoinOutcome::AlreadyMember;
        }

        let replaced = match room.kind() {
            RoomKind::Chat => None,
            kind => {
                let previous = entry.rooms.iter().find(|r| r.kind() == kind).cloned();
                if let Some(ref prev) = previous {
                    entry.rooms.remove(prev);
                }
                previous
            }
        };

        entry.rooms.insert(room);
        JoinOutcome::Joined { replaced }
    }

    pub async fn leave_room(&self, connection_id: Uuid, room: &RoomName) -> bool {
        let mut connections = self.inner.write().await;
        connections
            .get_mut(&connection_id)
            .is_some_and(|entry| entry.rooms.remove(room))
    }

    /// Queue a pre-serialized frame for delivery to one connection.
    pub async fn push(&self, connection_id: Uuid, text: &str) -> bool {
        let connections = self.inner.read().await;
        match connections.get(&connection_id) {
            Some(entry) => entry.outbox.send(text.to_string()).is_ok(),
            None => false,
        }
    }

    /// Serialize and queue an event for one connection.
    pub async fn send_event(&self, connection_id: Uuid, event: &ServerEvent) -> bool {
        match serde_json::to_string(event) {
            Ok(text) => self.push(connection_id, &text).await,
            Err(_) => false,
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    async fn register(registry: &ConnectionRegistry) -> Uuid {
        let id = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(id, identity("alice"), tx).await;
        id
    }

    #[tokio::test]
    async fn deregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let id = register(&registry).await;
        registry
            .join_room(id, RoomName::Document("d1".into()))
            .await;

        let first = registry.deregister(id).await;
        assert!(first.is_some());
        let (_, rooms) = first.unwrap();
        assert_eq!(rooms, vec![RoomName::Document("d1".into())]);

        // Second deregistration finds nothing.
        assert!(registry.deregister(id).await.is_none());
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn joining_second_document_displaces_first() {
        let registry = ConnectionRegistry::new();
        let id = register(&registry).await;

        let outcome = registry
            .join_room(id, RoomName::Document("d1".into()))
            .await;
        assert_eq!(outcome, JoinOutcome::Joined { replaced: None });

        let outcome = registry
            .join_room(id, RoomName::Document("d2".into()))
            .await;
        assert_eq!(
            outcome,
            JoinOutcome::Joined {
                replaced: Some(RoomName::Document("d1".into()))
            }
        );
    }

    #[tokio::test]
    async fn document_room_does_not_displace_other_kinds() {
        let registry = ConnectionRegistry::new();
        let id = register(&registry).await;

        registry
            .join_room(id, RoomName::Document("d1".into()))
            .await;
        registry.join_room(id, RoomName::Org("org1".into())).await;
        let outcome = registry.join_room(id, RoomName::Canvas("d1".into())).await;
        assert_eq!(outcome, JoinOutcome::Joined { replaced: None });

        let (_, rooms) = registry.deregister(id).await.unwrap();
        assert_eq!(rooms.len(), 3);
    }

    #[tokio::test]
    async fn chat_rooms_accumulate() {
        let registry = ConnectionRegistry::new();
        let id = register(&registry).await;

        registry.join_room(id, RoomName::Chat("p1".into())).await;
        let outcome = registry.join_room(id, RoomName::Chat("p2".into())).await;
        assert_eq!(outcome, JoinOutcome::Joined { replaced: None });

        let outcome = registry.join_room(id, RoomName::Chat("p1".into())).await;
        assert_eq!(outcome, JoinOutcome::AlreadyMember);
    }

    #[tokio::test]
    async fn push_to_unknown_connection_fails() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.push(Uuid::new_v4(), "{}").await);
    }
}
