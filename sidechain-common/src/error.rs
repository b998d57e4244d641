//! Shared error taxonomy for the real-time fabric.
//!
//! Every crate in the workspace funnels its failures through [`ErrorKind`]
//! so callers (retry policies, the HTTP edge, the hub's pump loops) can
//! dispatch on *kind* rather than match every concrete variant a producer
//! crate might add.

use thiserror::Error;

/// Coarse classification of a failure, per the propagation policy in the
/// error handling design: client input is surfaced, transient is retried,
/// permanent skips retry, resource backs off the caller, shutdown is
/// cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ClientInput,
    Transient,
    Permanent,
    Resource,
    Shutdown,
}

impl ErrorKind {
    /// Whether a failure of this kind should be retried by a bounded
    /// worker loop (the ingest pipeline's retry policy).
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

/// Error type shared by crates that don't need their own bespoke variants.
#[derive(Debug, Error)]
pub enum SidechainError {
    #[error("invalid input: {0}")]
    ClientInput(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("permanent failure: {0}")]
    Permanent(String),

    #[error("resource exhausted: {0}")]
    Resource(String),

    #[error("shutting down")]
    Shutdown,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SidechainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SidechainError::ClientInput(_) => ErrorKind::ClientInput,
            SidechainError::Transient(_) => ErrorKind::Transient,
            SidechainError::Permanent(_) => ErrorKind::Permanent,
            SidechainError::Resource(_) => ErrorKind::Resource,
            SidechainError::Shutdown => ErrorKind::Shutdown,
            SidechainError::Other(_) => ErrorKind::Permanent,
        }
    }
}

pub type Result<T> = std::result::Result<T, SidechainError>;
