use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::OnlineUser;

struct PresenceEntry {
    user: OnlineUser,
    /// Live connections for this user in this org room. A user with
    /// several tabs open is one presence entry until the last closes.
    connections: usize,
}

/// Organization-scoped presence, reference-counted per identity.
///
/// `user-online` fires only on the 0 -> 1 connection transition and
/// `user-offline` only on 1 -> 0, so a second tab never re-announces
/// and closing one of two tabs never flickers a user offline.
#[derive(Default)]
pub struct PresenceTracker {
    orgs: RwLock<HashMap<String, HashMap<String, PresenceEntry>>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one connection of `user` in an org room.
    ///
    /// Returns whether the user just came online, plus the online set
    /// as it stood without the joiner (the joiner's initial snapshot
    /// must not include itself).
    pub async fn join(&self, org_id: &str, user: OnlineUser) -> (bool, Vec<OnlineUser>) {
        let mut orgs = self.orgs.write().await;
        let room = orgs.entry(org_id.to_string()).or_default();

        let others = room
            .values()
            .filter(|entry| entry.user.user_id != user.user_id)
            .map(|entry| entry.user.clone())
            .collect();

        let entry = room
            .entry(user.user_id.clone())
            .or_insert_with(|| PresenceEntry {
                user,
                connections: 0,
            });
        entry.connections += 1;

        (entry.connections == 1, others)
    }

    /// Release one connection of a user. Returns true when the user
    /// went offline (last connection gone).
    pub async fn leave(&self, org_id: &str, user_id: &str) -> bool {
        let mut orgs = self.orgs.write().await;
        let Some(room) = orgs.get_mut(org_id) else {
            return false;
        };
        let Some(entry) = room.get_mut(user_id) else {
            return false;
        };

        entry.connections = entry.connections.saturating_sub(1);
        if entry.connections > 0 {
            return false;
        }

        room.remove(user_id);
        if room.is_empty() {
            orgs.remove(org_id);
        }
        true
    }

    /// Distinct users online across all org rooms.
    pub async fn online_count(&self) -> usize {
        self.orgs.read().await.values().map(|room| room.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(user_id: &str) -> OnlineUser {
        OnlineUser {
            user_id: user_id.into(),
            email: format!("{user_id}@example.com"),
            name: user_id.into(),
        }
    }

    #[tokio::test]
    async fn first_joiner_sees_empty_set() {
        let presence = PresenceTracker::new();
        let (became_online, others) = presence.join("org1", user("alice")).await;
        assert!(became_online);
        assert!(others.is_empty());
    }

    #[tokio::test]
    async fn second_joiner_sees_first_but_not_self() {
        let presence = PresenceTracker::new();
        presence.join("org1", user("alice")).await;

        let (became_online, others) = presence.join("org1", user("bob")).await;
        assert!(became_online);
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].user_id, "alice");
    }

    #[tokio::test]
    async fn duplicate_tabs_collapse_to_one_entry() {
        let presence = PresenceTracker::new();
        let (first, _) = presence.join("org1", user("alice")).await;
        let (second, others) = presence.join("org1", user("alice")).await;

        assert!(first);
        assert!(!second, "second tab must not re-announce");
        assert!(others.is_empty(), "own entry must not appear as a peer");

        // Closing one of two tabs keeps the user online.
        assert!(!presence.leave("org1", "alice").await);
        assert!(presence.leave("org1", "alice").await);
        assert_eq!(presence.online_count().await, 0);
    }

    #[tokio::test]
    async fn orgs_are_isolated() {
        let presence = PresenceTracker::new();
        presence.join("org1", user("alice")).await;

        let (_, others) = presence.join("org2", user("bob")).await;
        assert!(others.is_empty());
        assert_eq!(presence.online_count().await, 2);
    }

    #[tokio::test]
    async fn leave_of_unknown_user_is_noop() {
        let presence = PresenceTracker::new();
        assert!(!presence.leave("org1", "ghost").await);
    }
}
