//! Presence aggregation: per-user connection counts, a grace-interval
//! timer on the transition to zero, and client-asserted status
//! overrides (Idle/InStudio) per spec §4.2.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sidechain_common::UserId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Idle,
    InStudio,
    Offline,
}

#[derive(Debug, Clone)]
pub struct PresenceRecord {
    pub user_id: UserId,
    pub status: PresenceStatus,
    pub last_seen: DateTime<Utc>,
    pub connection_count: u32,
}

struct UserState {
    connection_count: u32,
    status: PresenceStatus,
    last_seen: DateTime<Utc>,
    /// Bumped on every transition-to-zero; a grace task compares this
    /// against its captured value before flipping to Offline, so a
    /// reconnect within the grace window cancels the pending flip
    /// without needing to hold a `JoinHandle`.
    generation: u64,
}

pub struct PresenceManager {
    users: RwLock<HashMap<UserId, UserState>>,
    grace: Duration,
}

impl PresenceManager {
    pub fn new(grace: Duration) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            grace,
        }
    }

    /// Called on connection registration. Returns `true` if this is the
    /// user's first connection (a fresh Online transition worth
    /// publishing).
    pub async fn on_connect(&self, user_id: UserId) -> bool {
        let mut users = self.users.write().await;
        let state = users.entry(user_id).or_insert_with(|| UserState {
            connection_count: 0,
            status: PresenceStatus::Offline,
            last_seen: Utc::now(),
            generation: 0,
        });
        state.connection_count += 1;
        state.last_seen = Utc::now();
        state.generation += 1;
        let was_offline = state.status == PresenceStatus::Offline;
        state.status = PresenceStatus::Online;
        was_offline
    }

    /// Called on disconnect. When the count drops to zero, arms the
    /// grace interval and returns the generation the caller should pass
    /// to [`Self::grace_expired`] after sleeping.
    pub async fn on_disconnect(&self, user_id: UserId) -> Option<u64> {
        let mut users = self.users.write().await;
        let Some(state) = users.get_mut(&user_id) else {
            return None;
        };
        state.connection_count = state.connection_count.saturating_sub(1);
        state.last_seen = Utc::now();
        if state.connection_count == 0 {
            state.generation += 1;
            Some(state.generation)
        } else {
            None
        }
    }

    /// Invoked by the background grace task after sleeping `self.grace`.
    /// Flips the user to Offline only if no new connection arrived
    /// (the generation is unchanged) and the count is still zero.
    /// Returns `true` if the flip happened (caller should publish
    /// `presence_update`).
    pub async fn grace_expired(&self, user_id: UserId, observed_generation: u64) -> bool {
        let mut users = self.users.write().await;
        let Some(state) = users.get_mut(&user_id) else {
            return false;
        };
        if state.connection_count == 0 && state.generation == observed_generation {
            state.status = PresenceStatus::Offline;
            true
        } else {
            false
        }
    }

    /// A client-asserted status override (Idle/InStudio), superseding
    /// Online until a newer update or disconnect.
    pub async fn set_status(&self, user_id: UserId, status: PresenceStatus) {
        let mut users = self.users.write().await;
        if let Some(state) = users.get_mut(&user_id) {
            if state.connection_count > 0 {
                state.status = status;
                state.last_seen = Utc::now();
            }
        }
    }

    pub async fn presence(&self, user_id: UserId) -> PresenceRecord {
        let users = self.users.read().await;
        match users.get(&user_id) {
            Some(state) => PresenceRecord {
                user_id,
                status: state.status,
                last_seen: state.last_seen,
                connection_count: state.connection_count,
            },
            None => PresenceRecord {
                user_id,
                status: PresenceStatus::Offline,
                last_seen: Utc::now(),
                connection_count: 0,
            },
        }
    }

    /// Intersects `following` with users currently InStudio.
    pub async fn friends_in_studio(&self, following: &HashSet<UserId>) -> Vec<UserId> {
        let users = self.users.read().await;
        following
            .iter()
            .filter(|uid| {
                users
                    .get(uid)
                    .map(|s| s.status == PresenceStatus::InStudio)
                    .unwrap_or(false)
            })
            .copied()
            .collect()
    }

    pub fn grace_interval(&self) -> Duration {
        self.grace
    }
}

pub fn shared(grace: Duration) -> Arc<PresenceManager> {
    Arc::new(PresenceManager::new(grace))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn online_while_connection_count_positive() {
        let pm = PresenceManager::new(Duration::from_millis(10));
        let user = UserId::new();
        assert!(pm.on_connect(user).await);
        let record = pm.presence(user).await;
        assert_eq!(record.status, PresenceStatus::Online);
        assert_eq!(record.connection_count, 1);
    }

    #[tokio::test]
    async fn offline_iff_count_zero_and_grace_elapsed() {
        let pm = PresenceManager::new(Duration::from_millis(5));
        let user = UserId::new();
        pm.on_connect(user).await;
        let generation = pm.on_disconnect(user).await.unwrap();

        // Not yet offline: grace hasn't elapsed.
        assert_eq!(pm.presence(user).await.status, PresenceStatus::Online);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(pm.grace_expired(user, generation).await);
        assert_eq!(pm.presence(user).await.status, PresenceStatus::Offline);
    }

    #[tokio::test]
    async fn reconnect_before_grace_cancels_offline_flip() {
        let pm = PresenceManager::new(Duration::from_millis(50));
        let user = UserId::new();
        pm.on_connect(user).await;
        let generation = pm.on_disconnect(user).await.unwrap();
        pm.on_connect(user).await;

        // Stale grace task for the old generation must not flip to offline.
        assert!(!pm.grace_expired(user, generation).await);
        assert_eq!(pm.presence(user).await.status, PresenceStatus::Online);
    }

    #[tokio::test]
    async fn in_studio_override_tracked_by_friends_in_studio() {
        let pm = PresenceManager::new(Duration::from_secs(30));
        let user = UserId::new();
        pm.on_connect(user).await;
        pm.set_status(user, PresenceStatus::InStudio).await;

        let mut following = HashSet::new();
        following.insert(user);
        let in_studio = pm.friends_in_studio(&following).await;
        assert_eq!(in_studio, vec![user]);
    }
}
