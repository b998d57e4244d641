//! Shared building blocks for the Sidechain real-time fabric: error
//! taxonomy, configuration, a keyed TTL cache facade, rate limiting and
//! alert rules. Depended on by every other crate in the workspace.

pub mod alerts;
pub mod cache;
pub mod config;
pub mod error;
pub mod ids;

pub use alerts::{AlertFired, AlertRule, AlertRules};
pub use cache::KeyedCache;
pub use config::{get_config, SidechainConfig};
pub use error::{ErrorKind, Result, SidechainError};
pub use ids::{ConnectionId, DocId, JobId, PostId, SoundId, UserId};
pub use rate_limit::RateLimiter;

pub mod rate_limit;
