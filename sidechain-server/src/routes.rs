//! Illustrative HTTP surface (spec §4.6): a WebSocket upgrade backed by
//! the hub, and thin JSON pass-throughs for the ranker, ingest pipeline
//! and document core. Full HTTP routing/auth is out of scope (spec §1)
//! — these handlers skip auth and accept trusted request bodies.

use crate::state::AppState;
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use sidechain_common::{JobId, UserId};
use sidechain_ingest::{AudioSource, Job};
use sidechain_ot::OpRequest;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/timeline", get(timeline))
        .route("/ingest/jobs", post(submit_job))
        .route("/ingest/jobs/{job_id}", get(job_status))
        .route("/documents/{doc_id}/operations", post(submit_operation))
        .with_state(state)
}

#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

async fn ws_upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
) -> Response {
    let validator: Arc<dyn sidechain_hub::TokenValidator> = Arc::new(sidechain_hub::EchoTokenValidator);
    sidechain_hub::ws::upgrade(ws, query.token, state.hub, validator).await
}

#[derive(Deserialize)]
struct TimelineQuery {
    user_id: UserId,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    20
}

async fn timeline(State(state): State<AppState>, Query(query): Query<TimelineQuery>) -> Response {
    let response = state
        .ranker
        .timeline(query.user_id, query.limit, query.offset, &HashSet::new())
        .await;
    Json(serde_json::json!({
        "items": response.items.iter().map(|i| serde_json::json!({
            "post_id": i.post_id.to_string(),
            "author_id": i.author_id.to_string(),
            "source": i.source.to_string(),
        })).collect::<Vec<_>>(),
        "has_more": response.meta.has_more,
        "degraded": response.meta.degraded.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
    }))
    .into_response()
}

#[derive(Deserialize)]
struct SubmitJobRequest {
    owner: UserId,
    path: String,
}

async fn submit_job(State(state): State<AppState>, Json(req): Json<SubmitJobRequest>) -> Response {
    let job = Job::new(req.owner, AudioSource::Path(req.path.clone().into()), req.path);
    let job_id = job.id;
    match state.pipeline.enqueue(job).await {
        Ok(_) => (StatusCode::ACCEPTED, Json(serde_json::json!({ "job_id": job_id.to_string() }))).into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

async fn job_status(State(state): State<AppState>, Path(job_id): Path<JobId>) -> Response {
    match state.pipeline.status(job_id).await {
        Some(status) => Json(serde_json::json!({
            "stage": format!("{:?}", status.stage),
            "attempt": status.attempt,
            "last_error": status.last_error,
        }))
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn submit_operation(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
    Json(req): Json<OpRequest>,
) -> Response {
    match state.documents.apply(&doc_id, req).await {
        Ok(op) => Json(serde_json::json!({ "server_seq": op.server_seq })).into_response(),
        Err(e) => (StatusCode::CONFLICT, e.to_string()).into_response(),
    }
}
