//! Error taxonomy for the hub.

use sidechain_common::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("invalid auth token")]
    Unauthorized,

    #[error("outbound buffer full for connection {0}")]
    SlowConsumer(String),

    #[error("hub is shutting down")]
    ShuttingDown,
}

impl HubError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HubError::ConnectionNotFound(_) => ErrorKind::ClientInput,
            HubError::Unauthorized => ErrorKind::ClientInput,
            HubError::SlowConsumer(_) => ErrorKind::Resource,
            HubError::ShuttingDown => ErrorKind::Shutdown,
        }
    }
}

pub type Result<T> = std::result::Result<T, HubError>;

/// Close code used when upgrade-time token validation fails (spec §6).
pub const CLOSE_CODE_UNAUTHORIZED: u16 = 4401;
