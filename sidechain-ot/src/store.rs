//! Process-scoped singleton map of documents, guarded by a single
//! reader/writer lock per spec §5 "Shared-resource policy": the apply
//! path (which assigns a sequence and transforms against pending ops)
//! takes the write lock, `history` takes the read lock.
//!
//! Grounded on `pmoplaylist::manager::ManagerInner.playlists`: an
//! id-keyed `RwLock<HashMap<..>>` touched across `.await` points.

use crate::document::Document;
use crate::error::Result;
use crate::operation::{OpRequest, Operation};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct DocumentStore {
    documents: RwLock<HashMap<String, Document>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transforms, sequences, and applies `req` against the named
    /// document, creating it empty on first use. The sequence counter
    /// and pending-queue transform happen under the same write-lock hold
    /// so they stay atomic together (spec §5 "OT sequence counter").
    pub async fn apply(&self, doc_id: &str, req: OpRequest) -> Result<Operation> {
        let mut docs = self.documents.write().await;
        let doc = docs
            .entry(doc_id.to_string())
            .or_insert_with(|| Document::new(doc_id));
        doc.apply(req)
    }

    pub async fn history(&self, doc_id: &str, from_seq: u64) -> Vec<Operation> {
        let docs = self.documents.read().await;
        docs.get(doc_id)
            .map(|d| d.history_since(from_seq))
            .unwrap_or_default()
    }

    pub async fn content(&self, doc_id: &str) -> Option<String> {
        let docs = self.documents.read().await;
        docs.get(doc_id).map(|d| d.content().to_string())
    }

    pub async fn get_or_create(&self, doc_id: &str) {
        let mut docs = self.documents.write().await;
        docs.entry(doc_id.to_string())
            .or_insert_with(|| Document::new(doc_id));
    }

    pub async fn doc_count(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OpKind;

    fn insert_req(client: &str, base_seq: u64, pos: usize, text: &str) -> OpRequest {
        OpRequest {
            client_id: client.into(),
            client_seq: 1,
            base_seq,
            kind: OpKind::Insert {
                position: pos,
                content: text.into(),
            },
        }
    }

    #[tokio::test]
    async fn apply_creates_document_on_first_use() {
        let store = DocumentStore::new();
        store.apply("doc1", insert_req("1", 0, 0, "hi")).await.unwrap();
        assert_eq!(store.content("doc1").await.as_deref(), Some("hi"));
        assert_eq!(store.doc_count().await, 1);
    }

    #[tokio::test]
    async fn history_is_empty_for_unknown_document() {
        let store = DocumentStore::new();
        assert!(store.history("missing", 0).await.is_empty());
    }
}
