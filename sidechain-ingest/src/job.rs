//! Job data model and the stage state machine (spec §3, §4.1).

use sidechain_common::{JobId, UserId};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Queued,
    Transcoding,
    Fingerprinting,
    Matching,
    Publishing,
    Completed,
    Failed,
    DeadLettered,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed | Stage::DeadLettered)
    }
}

/// Where the audio bytes live, handed off by the HTTP edge (out of
/// scope per spec §1 — this crate only reads the reference).
#[derive(Debug, Clone)]
pub enum AudioSource {
    Path(std::path::PathBuf),
    Bytes(std::sync::Arc<Vec<u8>>),
}

/// A unit of audio work. Owned exclusively by the worker that claimed it
/// (spec §3 invariant) — `sidechain-ingest` never hands a `Job` to more
/// than one worker task at a time.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub owner: UserId,
    pub source: AudioSource,
    pub original_filename: String,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub attempt: u32,
    pub last_error: Option<String>,
    pub stage: Stage,
}

impl Job {
    pub fn new(owner: UserId, source: AudioSource, original_filename: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            owner,
            source,
            original_filename: original_filename.into(),
            submitted_at: chrono::Utc::now(),
            attempt: 0,
            last_error: None,
            stage: Stage::Queued,
        }
    }

    /// Bumps the attempt count and resets to `Queued` for a retry
    /// (spec §3 "transitions move monotonically... no backtracking
    /// except on retry").
    pub fn prepare_retry(&mut self, error: impl Into<String>) {
        self.attempt += 1;
        self.last_error = Some(error.into());
        self.stage = Stage::Queued;
    }
}

/// A read-only status snapshot returned by `Status(job id)`.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub stage: Stage,
    pub attempt: u32,
    pub last_error: Option<String>,
    pub recorded_at: Instant,
}
