mod bridge;
mod routes;
mod state;

use bridge::HubCompletionSink;
use sidechain_common::config::get_config;
use sidechain_common::{AlertRule, AlertRules};
use sidechain_hub::{Hub, HubConfig};
use sidechain_ingest::{FakeTranscoder, InMemoryCatalog, InMemoryObjectStore, IngestPipeline, PipelineConfig};
use sidechain_ot::DocumentStore;
use sidechain_ranker::{source, Ranker};
use state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How often the pipeline's queue-depth/DLQ-size gauges are sampled
/// against the alert thresholds.
const ALERT_SAMPLE_INTERVAL: Duration = Duration::from_secs(10);

/// Spawns the task that samples `pipeline`'s gauges into `alerts` and logs
/// any rule that fires. Runs until `shutdown` cancels.
fn spawn_alert_sampler(
    pipeline: Arc<IngestPipeline>,
    alerts: Arc<AlertRules>,
    shutdown: tokio_util::sync::CancellationToken,
) {
    let mut fired = alerts.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = fired.recv().await {
            tracing::warn!(
                rule = %event.rule,
                value = event.value,
                threshold = event.threshold,
                "alert fired"
            );
        }
    });

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ALERT_SAMPLE_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let metrics = pipeline.metrics();
                    alerts.sample("ingest_queue_depth", metrics.queue_depth.get() as f64);
                    alerts.sample("ingest_dlq_size", metrics.dlq_size.get() as f64);
                }
                _ = shutdown.cancelled() => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = get_config();

    // ========== PHASE 1: Real-Time Hub ==========
    info!("starting real-time hub");
    let hub = Hub::new(HubConfig::from(&config.hub));

    // ========== PHASE 2: Audio Ingest Pipeline ==========
    info!("starting audio ingest pipeline");
    // `FakeTranscoder` stands in for a real ffmpeg-shelling `ProcessTranscoder`
    // (sidechain_ingest::ProcessTranscoder is a documented extension point,
    // not wired up here since this workspace can't exercise a real ffmpeg
    // invocation). `InMemoryCatalog`/`InMemoryObjectStore` stand in for the
    // relational catalog and object store collaborators, out of scope per
    // the system's component boundaries.
    let transcoder = Arc::new(FakeTranscoder::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    let object_store = Arc::new(InMemoryObjectStore::new());
    let completion_sink = Arc::new(HubCompletionSink(hub.clone()));
    let pipeline = IngestPipeline::new(
        PipelineConfig::from(&config.ingest),
        transcoder,
        catalog,
        object_store,
        completion_sink,
    );

    // ========== PHASE 3: Timeline Ranker ==========
    info!("starting timeline ranker");
    let ranker = Arc::new(Ranker::new(
        Arc::new(source::following_source()),
        Arc::new(source::recommended_source()),
        Arc::new(source::trending_source()),
        Arc::new(source::recent_source()),
        config.ranker.clone(),
    ));

    // ========== PHASE 4: Operational-Transform Document Core ==========
    info!("starting document store");
    let documents = Arc::new(DocumentStore::new());

    // Alert thresholds sized against the configured queue capacity: depth
    // nearing it means producers are outrunning workers; any DLQ entries
    // mean jobs already exhausted their retries (spec §4.1 observability).
    let alerts = sidechain_common::alerts::shared(vec![
        AlertRule {
            name: "ingest_queue_depth".into(),
            threshold: (config.ingest.queue_capacity as f64 * 0.8).max(1.0),
        },
        AlertRule {
            name: "ingest_dlq_size".into(),
            threshold: 1.0,
        },
    ]);
    let alert_shutdown = tokio_util::sync::CancellationToken::new();
    spawn_alert_sampler(pipeline.clone(), alerts, alert_shutdown.clone());

    let state = AppState {
        hub: hub.clone(),
        pipeline: pipeline.clone(),
        ranker,
        documents,
    };

    // ========== PHASE 5: HTTP server ==========
    let router = routes::build_router(state);
    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    info!(addr = "0.0.0.0:8080", "sidechain server ready");

    let server = axum::serve(listener, router);
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!(error = %e, "http server exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    info!("draining pipeline and hub");
    alert_shutdown.cancel();
    pipeline.stop(Duration::from_secs(10)).await;
    hub.shutdown(Duration::from_secs(5)).await;

    info!("sidechain server stopped");
    Ok(())
}
