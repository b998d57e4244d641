//! The Hub's public contract (spec §4.2): connection registration,
//! topic membership, fan-out, presence queries, and shutdown.

use crate::handlers::{HandlerContext, HandlerRegistry};
use crate::messages::{ClientFrame, ServerMessage};
use crate::presence::{PresenceManager, PresenceRecord, PresenceStatus};
use crate::registry::{user_topic, ConnectionHandle, Registry, Topic};
use sidechain_common::{ConnectionId, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub struct HubConfig {
    pub outbound_buffer: usize,
    pub read_idle: Duration,
    pub write_idle: Duration,
    pub presence_grace: Duration,
    pub max_frame_bytes: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: 256,
            read_idle: Duration::from_secs(60),
            write_idle: Duration::from_secs(30),
            presence_grace: Duration::from_secs(30),
            max_frame_bytes: 1 << 20,
        }
    }
}

impl From<&sidechain_common::config::HubConfig> for HubConfig {
    fn from(c: &sidechain_common::config::HubConfig) -> Self {
        Self {
            outbound_buffer: c.outbound_buffer,
            read_idle: Duration::from_secs(c.read_idle_secs),
            write_idle: Duration::from_secs(c.write_idle_secs),
            presence_grace: Duration::from_secs(c.presence_grace_secs),
            max_frame_bytes: c.max_frame_bytes,
        }
    }
}

/// The Real-Time Hub: a registry of authenticated WebSocket connections,
/// topic fan-out, presence aggregation, and handler dispatch. Process-
/// scoped singleton per spec §9 "Mutable global state".
pub struct Hub {
    pub(crate) registry: Registry,
    pub(crate) presence: Arc<PresenceManager>,
    pub(crate) handlers: HandlerRegistry,
    pub(crate) shutdown: CancellationToken,
    pub config: HubConfig,
}

impl Hub {
    pub fn new(config: HubConfig) -> Arc<Self> {
        let presence = Arc::new(PresenceManager::new(config.presence_grace));
        let handlers = HandlerRegistry::new();
        register_builtin_handlers(&handlers);

        Arc::new(Self {
            registry: Registry::new(),
            presence,
            handlers,
            shutdown: CancellationToken::new(),
            config,
        })
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Registers a new connection, opening its outbound channel and
    /// joining the implicit `user:{id}` topic. Returns the receiving end
    /// of the outbound channel for the write-pump to drain.
    pub async fn register(
        &self,
        id: ConnectionId,
        user_id: UserId,
    ) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(self.config.outbound_buffer);
        let handle = ConnectionHandle {
            id,
            user_id,
            tx,
            topics: HashSet::new(),
            last_heartbeat: chrono::Utc::now(),
        };
        self.registry.register(handle).await;

        if self.presence.on_connect(user_id).await {
            self.publish_presence_update(user_id).await;
        }

        rx
    }

    /// Unregisters a connection. `self` must be an `Arc<Hub>` — the
    /// grace-interval task spawned on a transition-to-zero needs to
    /// publish back through the hub once the grace window elapses,
    /// matching `pmoplaylist::manager`'s `manager_clone` pattern for its
    /// own background eviction task.
    pub async fn unregister(self: &Arc<Self>, id: ConnectionId, user_id: UserId) {
        self.registry.unregister(id).await;

        if let Some(generation) = self.presence.on_disconnect(user_id).await {
            let hub = self.clone();
            let grace = self.presence.grace_interval();
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                if hub.presence.grace_expired(user_id, generation).await {
                    hub.publish_presence_update(user_id).await;
                }
            });
        }
    }

    pub async fn subscribe(&self, id: ConnectionId, topic: impl Into<Topic>) {
        self.registry.subscribe(id, topic.into()).await;
    }

    pub async fn unsubscribe(&self, id: ConnectionId, topic: &str) {
        self.registry.unsubscribe(id, topic).await;
    }

    /// Non-blocking best-effort fan-out (spec §4.2): delivery order
    /// matches call order, no ordering across topics.
    pub async fn publish(&self, topic: &str, message: ServerMessage) {
        let outcome = self.registry.publish(topic, message).await;
        if !outcome.dropped_slow.is_empty() {
            tracing::warn!(
                topic,
                dropped = outcome.dropped_slow.len(),
                "closed slow subscribers during publish"
            );
        }
    }

    pub async fn send_to_user(&self, user_id: UserId, message: ServerMessage) {
        self.publish(&user_topic(user_id), message).await;
    }

    pub async fn presence(&self, user_id: UserId) -> PresenceRecord {
        self.presence.presence(user_id).await
    }

    pub async fn set_presence_status(&self, user_id: UserId, status: PresenceStatus) {
        self.presence.set_status(user_id, status).await;
        self.publish_presence_update(user_id).await;
    }

    pub async fn friends_in_studio(&self, following: &HashSet<UserId>) -> Vec<UserId> {
        self.presence.friends_in_studio(following).await
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub async fn dispatch_client_frame(&self, ctx: &HandlerContext, frame: &ClientFrame) {
        if frame.kind == "heartbeat" {
            self.registry.touch_heartbeat(ctx.connection_id).await;
        }

        // `presence_set` needs to await `set_presence_status`, which the
        // synchronous `Handler` closure type can't do, so it's special-
        // cased here rather than run through `self.handlers`.
        if frame.kind == "presence_set" {
            self.handle_presence_set(ctx, frame).await;
            return;
        }

        self.handlers.dispatch(ctx, frame);
    }

    /// Applies a client-asserted presence override. Only `idle` and
    /// `in_studio` are accepted from clients (spec §4.2) — `online` and
    /// `offline` are derived from connection lifecycle, never client-set.
    async fn handle_presence_set(&self, ctx: &HandlerContext, frame: &ClientFrame) {
        let Some(status_str) = frame.payload.get("status").and_then(|v| v.as_str()) else {
            tracing::debug!(conn = %ctx.connection_id, "presence_set missing status field");
            return;
        };

        let status = match status_str {
            "idle" => PresenceStatus::Idle,
            "in_studio" => PresenceStatus::InStudio,
            other => {
                tracing::debug!(conn = %ctx.connection_id, status = other, "presence_set rejected unsupported status");
                return;
            }
        };

        self.set_presence_status(ctx.user_id, status).await;
    }

    pub async fn touch_heartbeat(&self, id: ConnectionId) {
        self.registry.touch_heartbeat(id).await;
    }

    pub async fn is_registered(&self, id: ConnectionId) -> bool {
        self.registry.contains(id).await
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.connection_count().await
    }

    /// Stops accepting new connections (via the cancellation token every
    /// pump observes), broadcasts a graceful close, and awaits the drain
    /// up to `deadline`: every write-pump sends its close frame on
    /// cancellation, then both pumps tear the connection down and
    /// unregister it, so shutdown polls the registry until it empties or
    /// the deadline elapses.
    pub async fn shutdown(&self, deadline: Duration) {
        self.shutdown.cancel();
        let poll_interval = Duration::from_millis(10);
        let deadline_at = tokio::time::Instant::now() + deadline;
        while self.registry.connection_count().await > 0 {
            if tokio::time::Instant::now() >= deadline_at {
                tracing::warn!(
                    remaining = self.registry.connection_count().await,
                    "hub shutdown deadline reached with connections still draining"
                );
                break;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn publish_presence_update(&self, user_id: UserId) {
        let record = self.presence.presence(user_id).await;
        let payload = serde_json::json!({
            "user_id": user_id.to_string(),
            "status": record.status,
            "last_seen": record.last_seen,
        });
        self.publish(
            "presence",
            ServerMessage::new(crate::messages::ServerMessageKind::PresenceUpdate, payload),
        )
        .await;
    }

}


fn register_builtin_handlers(handlers: &HandlerRegistry) {
    handlers.handle_kind("heartbeat", |_ctx, _frame| {
        tracing::trace!("heartbeat received");
    });
    handlers.handle_kind("typing_start", |ctx, frame| {
        tracing::debug!(conn = %ctx.connection_id, payload = %frame.payload, "typing_start");
    });
    handlers.handle_kind("typing_stop", |ctx, frame| {
        tracing::debug!(conn = %ctx.connection_id, payload = %frame.payload, "typing_stop");
    });
}
