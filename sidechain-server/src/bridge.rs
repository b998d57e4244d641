//! Wires the ingest pipeline's completion event onto the hub's
//! `user:{owner}` topic (spec §4.1 step 7) without either crate knowing
//! about the other's existence.

use async_trait::async_trait;
use sidechain_common::{JobId, SoundId, UserId};
use sidechain_hub::{Hub, ServerMessage, ServerMessageKind};
use sidechain_ingest::CompletionSink;
use std::sync::Arc;

pub struct HubCompletionSink(pub Arc<Hub>);

#[async_trait]
impl CompletionSink for HubCompletionSink {
    async fn publish_completion(&self, owner: UserId, job_id: JobId, sound_id: SoundId, confidence: f64) {
        let payload = serde_json::json!({
            "job_id": job_id.to_string(),
            "sound_id": sound_id.to_string(),
            "confidence": confidence,
        });
        self.0
            .send_to_user(owner, ServerMessage::new(ServerMessageKind::IngestCompleted, payload))
            .await;
    }
}
