//! Error taxonomy for the ingest pipeline.

use sidechain_common::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum IngestError {
    #[error("queue is full")]
    QueueFull,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("transcode failed: {0}")]
    TranscodeFailed(String),

    #[error("transcode timed out")]
    TranscodeTimeout,

    #[error("insufficient spectral peaks to fingerprint")]
    InsufficientPeaks,

    #[error("catalog lookup failed: {0}")]
    CatalogUnavailable(String),

    #[error("object store failed: {0}")]
    ObjectStoreFailed(String),
}

impl IngestError {
    /// Classifies the failure per spec §7: malformed input and
    /// insufficient peaks are `Permanent` (no retry), I/O timeouts and
    /// catalog/store contention are `Transient` (retried).
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::QueueFull => ErrorKind::Resource,
            IngestError::RateLimited => ErrorKind::Resource,
            IngestError::NotFound(_) => ErrorKind::ClientInput,
            IngestError::TranscodeFailed(_) => ErrorKind::Permanent,
            IngestError::TranscodeTimeout => ErrorKind::Transient,
            IngestError::InsufficientPeaks => ErrorKind::Permanent,
            IngestError::CatalogUnavailable(_) => ErrorKind::Transient,
            IngestError::ObjectStoreFailed(_) => ErrorKind::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
