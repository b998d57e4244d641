//! Process-scoped handles shared across axum handlers.

use sidechain_hub::Hub;
use sidechain_ingest::IngestPipeline;
use sidechain_ot::DocumentStore;
use sidechain_ranker::Ranker;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub pipeline: Arc<IngestPipeline>,
    pub ranker: Arc<Ranker>,
    pub documents: Arc<DocumentStore>,
}
