//! Error taxonomy for the ranker, matching the shared `ErrorKind` classes.

use sidechain_common::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RankerError {
    #[error("all feed sources failed: {0}")]
    AllSourcesFailed(String),

    #[error("source {0} failed: {1}")]
    SourceFailed(String, String),
}

impl RankerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RankerError::AllSourcesFailed(_) => ErrorKind::Transient,
            RankerError::SourceFailed(..) => ErrorKind::Transient,
        }
    }
}

pub type Result<T> = std::result::Result<T, RankerError>;
