//! Operation types for the OT document core.
//!
//! Variants are discriminated by a tag and dispatched with an exhaustive
//! `match` rather than a dynamic dispatch table keyed by `(kind, kind)` —
//! the variant set is small, closed, and known up front, so a tagged enum
//! is the idiomatic fit (the same preference the teacher shows for
//! `StopReason` over an open-ended trait hierarchy).

use serde::{Deserialize, Serialize};

/// The edit payload of an operation: insert content at a position, or
/// delete a run of characters starting at a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OpKind {
    Insert { position: usize, content: String },
    Delete { position: usize, length: usize },
}

impl OpKind {
    pub fn position(&self) -> usize {
        match self {
            OpKind::Insert { position, .. } => *position,
            OpKind::Delete { position, .. } => *position,
        }
    }

    /// Length in characters touched by this operation (inserted content
    /// length, or deleted run length).
    pub fn len(&self) -> usize {
        match self {
            OpKind::Insert { content, .. } => content.chars().count(),
            OpKind::Delete { length, .. } => *length,
        }
    }
}

/// A client-submitted edit, prior to being sequenced by the server.
///
/// `base_seq` names the last server sequence the submitting client has
/// already incorporated into its local content — the document transforms
/// this operation against every operation applied after `base_seq` (the
/// "pending operations" the data model describes) before assigning it a
/// sequence of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpRequest {
    pub client_id: String,
    pub client_seq: u64,
    pub base_seq: u64,
    pub kind: OpKind,
}

/// A fully sequenced, immutable operation as recorded in document history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub client_id: String,
    pub client_seq: u64,
    pub server_seq: u64,
    pub kind: OpKind,
}
