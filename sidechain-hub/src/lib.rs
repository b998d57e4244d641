//! Real-Time Hub: a WebSocket connection manager with per-user fan-in/
//! fan-out, topic subscriptions, heartbeat-based liveness, and presence
//! aggregation. Depends only on `sidechain-common` (spec §2 dependency
//! order) — the ingest pipeline publishes into this crate through the
//! `CompletionSink`-style trait it defines itself, never the reverse.

pub mod error;
pub mod handlers;
pub mod hub;
pub mod messages;
pub mod presence;
pub mod registry;
pub mod ws;

pub use error::{HubError, Result, CLOSE_CODE_UNAUTHORIZED};
pub use handlers::{HandlerContext, HandlerRegistry};
pub use hub::{Hub, HubConfig};
pub use messages::{ClientFrame, ClientMessageKind, ServerMessage, ServerMessageKind};
pub use presence::{PresenceManager, PresenceRecord, PresenceStatus};
pub use registry::{user_topic, Registry, Topic};
pub use ws::{EchoTokenValidator, TokenValidator};
