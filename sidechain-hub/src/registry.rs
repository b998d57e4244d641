//! Connection registry and topic index.
//!
//! Grounded on `pmoplaylist::manager::ManagerInner`: an id-keyed
//! `RwLock<HashMap<..>>` of handles with a companion reverse index
//! (`track_index` there, the topic index here). All mutation paths take
//! the write lock, all iteration paths take the read lock (spec §5).

use crate::messages::ServerMessage;
use chrono::{DateTime, Utc};
use sidechain_common::{ConnectionId, UserId};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tokio::sync::RwLock;

pub type Topic = String;

pub fn user_topic(user_id: UserId) -> Topic {
    format!("user:{user_id}")
}

/// A registered connection's server-side handle: the channel the
/// write-pump drains, plus the topic set and heartbeat timestamp the
/// registry mutates on subscribe/unsubscribe/heartbeat.
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub tx: mpsc::Sender<ServerMessage>,
    pub topics: HashSet<Topic>,
    pub last_heartbeat: DateTime<Utc>,
}

#[derive(Default)]
pub struct Registry {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    topic_index: RwLock<HashMap<Topic, HashSet<ConnectionId>>>,
}

/// Outcome of a `publish` fan-out: which connections received the
/// message and which were dropped as slow consumers.
pub struct PublishOutcome {
    pub delivered: usize,
    pub dropped_slow: Vec<ConnectionId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, handle: ConnectionHandle) {
        let id = handle.id;
        let user_topic = user_topic(handle.user_id);
        let mut connections = self.connections.write().await;
        let mut topics = self.topic_index.write().await;

        topics.entry(user_topic.clone()).or_default().insert(id);
        let mut handle = handle;
        handle.topics.insert(user_topic);
        connections.insert(id, handle);
    }

    pub async fn unregister(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        let Some(handle) = connections.remove(&id) else {
            return;
        };
        let mut topics = self.topic_index.write().await;
        for topic in &handle.topics {
            if let Some(members) = topics.get_mut(topic) {
                members.remove(&id);
                if members.is_empty() {
                    topics.remove(topic);
                }
            }
        }
    }

    pub async fn subscribe(&self, id: ConnectionId, topic: Topic) {
        let mut connections = self.connections.write().await;
        let Some(handle) = connections.get_mut(&id) else {
            return;
        };
        handle.topics.insert(topic.clone());
        let mut topics = self.topic_index.write().await;
        topics.entry(topic).or_default().insert(id);
    }

    pub async fn unsubscribe(&self, id: ConnectionId, topic: &str) {
        let mut connections = self.connections.write().await;
        let Some(handle) = connections.get_mut(&id) else {
            return;
        };
        handle.topics.remove(topic);
        let mut topics = self.topic_index.write().await;
        if let Some(members) = topics.get_mut(topic) {
            members.remove(&id);
            if members.is_empty() {
                topics.remove(topic);
            }
        }
    }

    pub async fn is_subscribed(&self, id: ConnectionId, topic: &str) -> bool {
        let connections = self.connections.read().await;
        connections
            .get(&id)
            .map(|h| h.topics.contains(topic))
            .unwrap_or(false)
    }

    /// Non-blocking best-effort fan-out: attempts a `try_send` to every
    /// subscriber of `topic`, in the order they're iterated. A
    /// subscriber whose outbound buffer is full is unregistered and
    /// reported back as a slow consumer for the caller to close the
    /// underlying socket (spec §4.2).
    pub async fn publish(&self, topic: &str, message: ServerMessage) -> PublishOutcome {
        let members: Vec<ConnectionId> = {
            let topics = self.topic_index.read().await;
            topics
                .get(topic)
                .map(|m| m.iter().copied().collect())
                .unwrap_or_default()
        };

        let mut delivered = 0;
        let mut dropped_slow = Vec::new();

        for conn_id in members {
            let tx = {
                let connections = self.connections.read().await;
                connections.get(&conn_id).map(|h| h.tx.clone())
            };
            let Some(tx) = tx else { continue };
            match tx.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    dropped_slow.push(conn_id);
                    self.unregister(conn_id).await;
                }
            }
        }

        PublishOutcome {
            delivered,
            dropped_slow,
        }
    }

    pub async fn touch_heartbeat(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(handle) = connections.get_mut(&id) {
            handle.last_heartbeat = Utc::now();
        }
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn topic_member_count(&self, topic: &str) -> usize {
        self.topic_index
            .read()
            .await
            .get(topic)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    pub async fn all_connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.read().await.keys().copied().collect()
    }
}
