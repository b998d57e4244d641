//! Per-document OT state: sequencing, transform-against-pending, apply,
//! and history.

use crate::error::{OtError, Result};
use crate::operation::{OpKind, OpRequest, Operation};
use crate::transform::transform;

/// A single document's content plus its append-only operation history.
///
/// The sequence counter and the pending-queue transform must be updated
/// atomically together to preserve convergence (spec §5): callers only
/// ever reach a `Document` through [`DocumentStore::apply`], which holds
/// the store's write lock for the whole of [`Document::apply`].
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    content: String,
    last_applied_seq: u64,
    history: Vec<Operation>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: String::new(),
            last_applied_seq: 0,
            history: Vec::new(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn last_applied_seq(&self) -> u64 {
        self.last_applied_seq
    }

    /// Transforms `req` against every operation applied after its
    /// `base_seq`, assigns it the next server sequence, applies it to
    /// content, and appends it to history. Returns the transformed,
    /// sequenced operation.
    pub fn apply(&mut self, req: OpRequest) -> Result<Operation> {
        let pending: Vec<&Operation> = self
            .history
            .iter()
            .filter(|op| op.server_seq > req.base_seq)
            .collect();

        let mut kind = req.kind;
        for pending_op in pending {
            kind = transform(&kind, &req.client_id, &pending_op.kind, &pending_op.client_id);
        }

        self.apply_kind(&kind)?;

        let server_seq = self.last_applied_seq + 1;
        self.last_applied_seq = server_seq;

        let op = Operation {
            client_id: req.client_id,
            client_seq: req.client_seq,
            server_seq,
            kind,
        };
        self.history.push(op.clone());
        Ok(op)
    }

    /// Applies an already-transformed operation's edit to `content`,
    /// without sequencing or recording it. Used by replicas replaying
    /// history and by [`Self::apply`] itself.
    fn apply_kind(&mut self, kind: &OpKind) -> Result<()> {
        let len = self.content.chars().count();
        match kind {
            OpKind::Insert { position, content } => {
                if *position > len {
                    return Err(OtError::OutOfBounds(*position, len));
                }
                let byte_idx = char_to_byte_index(&self.content, *position);
                self.content.insert_str(byte_idx, content);
            }
            OpKind::Delete { position, length } => {
                if position + length > len {
                    return Err(OtError::OutOfBounds(position + length, len));
                }
                let start = char_to_byte_index(&self.content, *position);
                let end = char_to_byte_index(&self.content, position + length);
                self.content.replace_range(start..end, "");
            }
        }
        Ok(())
    }

    pub fn history_since(&self, from_seq: u64) -> Vec<Operation> {
        self.history
            .iter()
            .filter(|op| op.server_seq > from_seq)
            .cloned()
            .collect()
    }

    /// Rebuilds content from scratch by replaying `history` in order —
    /// the round-trip property from spec §8.
    pub fn replay_from_history(&self) -> Result<String> {
        let mut content = String::new();
        for op in &self.history {
            let len = content.chars().count();
            match &op.kind {
                OpKind::Insert { position, content: text } => {
                    if *position > len {
                        return Err(OtError::OutOfBounds(*position, len));
                    }
                    let byte_idx = char_to_byte_index(&content, *position);
                    content.insert_str(byte_idx, text);
                }
                OpKind::Delete { position, length } => {
                    if position + length > len {
                        return Err(OtError::OutOfBounds(position + length, len));
                    }
                    let start = char_to_byte_index(&content, *position);
                    let end = char_to_byte_index(&content, position + length);
                    content.replace_range(start..end, "");
                }
            }
        }
        Ok(content)
    }
}

fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(client: &str, client_seq: u64, base_seq: u64, pos: usize, text: &str) -> OpRequest {
        OpRequest {
            client_id: client.into(),
            client_seq,
            base_seq,
            kind: OpKind::Insert {
                position: pos,
                content: text.into(),
            },
        }
    }

    #[test]
    fn apply_insert_and_delete_in_bounds() {
        let mut doc = Document::new("d1");
        doc.apply(insert("1", 1, 0, 0, "hello")).unwrap();
        assert_eq!(doc.content(), "hello");

        doc.apply(OpRequest {
            client_id: "1".into(),
            client_seq: 2,
            base_seq: 1,
            kind: OpKind::Delete {
                position: 0,
                length: 1,
            },
        })
        .unwrap();
        assert_eq!(doc.content(), "ello");
    }

    #[test]
    fn apply_out_of_bounds_insert_fails() {
        let mut doc = Document::new("d1");
        let result = doc.apply(insert("1", 1, 0, 10, "x"));
        assert!(result.is_err());
    }

    #[test]
    fn concurrent_inserts_converge_client_1_wins_tie() {
        // Scenario 6: starting with "hello", client 1 inserts "X" at 0,
        // client 2 inserts "Y" at 0, submitted concurrently (both base
        // on seq 1, the state after "hello" was inserted).
        let mut doc = Document::new("d1");
        doc.apply(insert("0", 1, 0, 0, "hello")).unwrap();

        let op1 = doc
            .apply(insert("1", 1, 1, 0, "X"))
            .unwrap();
        let op2 = doc
            .apply(insert("2", 1, 1, 0, "Y"))
            .unwrap();

        assert_eq!(doc.content(), "XYhello");

        // Each client replays the other's transformed op against its own
        // local content and must converge to the same string.
        let mut client1_view = "Xhello".to_string();
        apply_to_string(&mut client1_view, &op2.kind);
        assert_eq!(client1_view, "XYhello");

        let mut client2_view = "Yhello".to_string();
        apply_to_string(&mut client2_view, &op1.kind);
        assert_eq!(client2_view, "XYhello");
    }

    fn apply_to_string(s: &mut String, kind: &OpKind) {
        match kind {
            OpKind::Insert { position, content } => {
                let idx = char_to_byte_index(s, *position);
                s.insert_str(idx, content);
            }
            OpKind::Delete { position, length } => {
                let start = char_to_byte_index(s, *position);
                let end = char_to_byte_index(s, position + length);
                s.replace_range(start..end, "");
            }
        }
    }

    #[test]
    fn history_replay_reproduces_content() {
        let mut doc = Document::new("d1");
        doc.apply(insert("1", 1, 0, 0, "hello")).unwrap();
        doc.apply(insert("1", 2, 1, 5, " world")).unwrap();
        doc.apply(OpRequest {
            client_id: "1".into(),
            client_seq: 3,
            base_seq: 2,
            kind: OpKind::Delete {
                position: 0,
                length: 6,
            },
        })
        .unwrap();

        assert_eq!(doc.replay_from_history().unwrap(), doc.content());
    }

    #[test]
    fn history_since_returns_only_later_ops() {
        let mut doc = Document::new("d1");
        doc.apply(insert("1", 1, 0, 0, "a")).unwrap();
        doc.apply(insert("1", 2, 1, 0, "b")).unwrap();
        doc.apply(insert("1", 3, 2, 0, "c")).unwrap();

        let since = doc.history_since(1);
        assert_eq!(since.len(), 2);
        assert!(since.iter().all(|op| op.server_seq > 1));
    }
}
