//! The worker pool: a fixed set of tokio tasks draining a bounded queue,
//! running each job through transcode → fingerprint → match → publish,
//! with retry-on-transient and dead-lettering after max attempts (spec
//! §4.1).
//!
//! Grounded directly on `pmoaudio::pipeline::AudioPipelineNode` /
//! `PipelineHandle`: a `CancellationToken`-coordinated spawn/stop with
//! `JoinHandle`s tracked per worker.

use crate::collaborators::{CompletionSink, NewSound, ObjectStore, SoundCatalog, Transcoder};
use crate::error::{IngestError, Result};
use crate::fingerprint::fingerprint_pcm;
use crate::job::{AudioSource, Job, JobStatus, Stage};
use crate::metrics::PipelineMetrics;
use crate::retry::backoff_for_attempt;
use sidechain_common::rate_limit::RateLimiter;
use sidechain_common::{JobId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct PipelineConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub base_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub sample_rate: u32,
    pub match_confidence_threshold: f64,
    /// How long a completed/failed job's status stays queryable before
    /// `Status` returns `NotFound` (spec §4.1 public contract).
    pub status_ttl: Duration,
    pub rate_limit_capacity: f64,
    pub rate_limit_refill_per_sec: f64,
}

impl From<&sidechain_common::config::IngestConfig> for PipelineConfig {
    fn from(c: &sidechain_common::config::IngestConfig) -> Self {
        Self {
            workers: c.workers,
            queue_capacity: c.queue_capacity,
            max_attempts: c.max_attempts,
            base_backoff_secs: c.base_backoff_secs,
            max_backoff_secs: c.max_backoff_secs,
            sample_rate: 8000,
            match_confidence_threshold: 0.7,
            status_ttl: Duration::from_secs(3600),
            rate_limit_capacity: c.rate_limit_capacity,
            rate_limit_refill_per_sec: c.rate_limit_refill_per_sec,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
            max_attempts: 5,
            base_backoff_secs: 2,
            max_backoff_secs: 60,
            sample_rate: 8000,
            match_confidence_threshold: 0.7,
            status_ttl: Duration::from_secs(3600),
            rate_limit_capacity: 5.0,
            rate_limit_refill_per_sec: 0.5,
        }
    }
}

struct StatusEntry {
    status: JobStatus,
}

/// The pipeline's process-scoped state: the bounded queue's sender half,
/// the status map, and the collaborators every worker shares.
pub struct IngestPipeline {
    config: PipelineConfig,
    tx: mpsc::Sender<Job>,
    statuses: Arc<RwLock<HashMap<JobId, StatusEntry>>>,
    dlq: Arc<RwLock<Vec<Job>>>,
    metrics: Arc<PipelineMetrics>,
    shutdown: CancellationToken,
    worker_handles: RwLock<Vec<JoinHandle<()>>>,
    rate_limiter: RateLimiter<UserId>,
}

impl IngestPipeline {
    pub fn new<T, C, O, S>(
        config: PipelineConfig,
        transcoder: Arc<T>,
        catalog: Arc<C>,
        object_store: Arc<O>,
        completion_sink: Arc<S>,
    ) -> Arc<Self>
    where
        T: Transcoder + 'static,
        C: SoundCatalog + 'static,
        O: ObjectStore + 'static,
        S: CompletionSink + 'static,
    {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let statuses = Arc::new(RwLock::new(HashMap::new()));
        let dlq = Arc::new(RwLock::new(Vec::new()));
        let metrics = Arc::new(PipelineMetrics::default());
        let shutdown = CancellationToken::new();
        let rate_limiter = RateLimiter::new(config.rate_limit_capacity, config.rate_limit_refill_per_sec);

        let pipeline = Arc::new(Self {
            config,
            tx,
            statuses,
            dlq,
            metrics,
            shutdown,
            worker_handles: RwLock::new(Vec::new()),
            rate_limiter,
        });

        let worker_count = pipeline.config.workers;
        let shared_rx = Arc::new(tokio::sync::Mutex::new(rx));

        for worker_id in 0..worker_count {
            let pipeline_clone = pipeline.clone();
            let rx_clone = shared_rx.clone();
            let transcoder = transcoder.clone();
            let catalog = catalog.clone();
            let object_store = object_store.clone();
            let completion_sink = completion_sink.clone();
            let handle = tokio::spawn(async move {
                pipeline_clone
                    .worker_loop(worker_id, rx_clone, transcoder, catalog, object_store, completion_sink)
                    .await;
            });
            // worker_handles is only mutated here, before `start()` hands
            // out any clones of `pipeline`, so a blocking `try_write` is
            // safe and avoids an async fn just for construction.
            if let Ok(mut handles) = pipeline.worker_handles.try_write() {
                handles.push(handle);
            }
        }

        pipeline
    }

    /// Non-blocking enqueue; fails with `QueueFull` under backpressure and
    /// `RateLimited` once `job.owner`'s token bucket is exhausted, rather
    /// than ever suspending the caller (spec §4.1).
    pub async fn enqueue(&self, job: Job) -> Result<JobId> {
        if !self.rate_limiter.try_acquire(&job.owner) {
            return Err(IngestError::RateLimited);
        }

        let job_id = job.id;
        self.statuses.write().await.insert(
            job_id,
            StatusEntry {
                status: JobStatus {
                    stage: Stage::Queued,
                    attempt: job.attempt,
                    last_error: None,
                    recorded_at: Instant::now(),
                },
            },
        );

        match self.tx.try_send(job) {
            Ok(()) => {
                self.metrics.jobs_enqueued.incr();
                self.metrics.queue_depth.incr();
                Ok(job_id)
            }
            Err(_) => {
                self.statuses.write().await.remove(&job_id);
                Err(IngestError::QueueFull)
            }
        }
    }

    pub async fn status(&self, job_id: JobId) -> Option<JobStatus> {
        let statuses = self.statuses.read().await;
        let entry = statuses.get(&job_id)?;
        if entry.status.stage.is_terminal()
            && entry.status.recorded_at.elapsed() > self.config.status_ttl
        {
            return None;
        }
        Some(entry.status.clone())
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub async fn dlq_jobs(&self) -> Vec<Job> {
        self.dlq.read().await.clone()
    }

    /// Stops accepting new jobs: cancellation only gates the next claim,
    /// so a job a worker already picked up keeps running to completion.
    /// Waits up to `deadline` across all workers for that in-flight work
    /// to finish, then aborts anything still running past it.
    pub async fn stop(&self, deadline: Duration) {
        self.shutdown.cancel();

        let handles = {
            let mut guard = self.worker_handles.write().await;
            std::mem::take(&mut *guard)
        };
        let deadline_at = Instant::now() + deadline;
        for mut handle in handles {
            let remaining = deadline_at.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining, &mut handle).await.is_err() {
                tracing::warn!("ingest pipeline drain deadline elapsed, aborting worker");
                handle.abort();
            }
        }
    }

    async fn set_status(&self, job: &Job) {
        let mut statuses = self.statuses.write().await;
        statuses.insert(
            job.id,
            StatusEntry {
                status: JobStatus {
                    stage: job.stage,
                    attempt: job.attempt,
                    last_error: job.last_error.clone(),
                    recorded_at: Instant::now(),
                },
            },
        );
    }

    #[allow(clippy::too_many_arguments)]
    async fn worker_loop<T, C, O, S>(
        self: Arc<Self>,
        worker_id: usize,
        rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
        transcoder: Arc<T>,
        catalog: Arc<C>,
        object_store: Arc<O>,
        completion_sink: Arc<S>,
    ) where
        T: Transcoder,
        C: SoundCatalog,
        O: ObjectStore,
        S: CompletionSink,
    {
        self.metrics.active_workers.incr();
        loop {
            let job = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                job = async {
                    let mut guard = rx.lock().await;
                    guard.recv().await
                } => job,
            };

            let Some(mut job) = job else { break };
            self.metrics.queue_depth.decr();
            tracing::debug!(worker_id, job_id = %job.id, "claimed job");

            let start = Instant::now();
            let outcome = self
                .run_job(&mut job, &*transcoder, &*catalog, &*object_store, &*completion_sink)
                .await;
            self.metrics.end_to_end_duration.observe(start.elapsed().as_secs_f64());

            match outcome {
                Ok(()) => {
                    job.stage = Stage::Completed;
                    self.set_status(&job).await;
                    self.metrics.jobs_completed.incr();
                }
                Err(e) if e.is_retryable() && job.attempt + 1 < self.config.max_attempts => {
                    // Backoff is keyed on the attempt that just failed, not
                    // the retry about to be queued, so the first retry
                    // waits `base_backoff_secs` rather than double that.
                    let delay = backoff_for_attempt(
                        job.attempt,
                        self.config.base_backoff_secs,
                        self.config.max_backoff_secs,
                    );
                    job.prepare_retry(e.to_string());
                    self.set_status(&job).await;
                    let tx = self.tx.clone();
                    let metrics = self.metrics.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        metrics.queue_depth.incr();
                        let _ = tx.send(job).await;
                    });
                }
                Err(e) => {
                    let failed_stage = job.stage;
                    job.last_error = Some(e.to_string());
                    if e.is_retryable() {
                        job.stage = Stage::DeadLettered;
                        self.dlq.write().await.push(job.clone());
                        self.metrics.dlq_size.incr();
                    } else {
                        job.stage = Stage::Failed;
                    }
                    self.set_status(&job).await;
                    match failed_stage {
                        Stage::Transcoding => self.metrics.failures_transcode.incr(),
                        Stage::Fingerprinting => self.metrics.failures_fingerprint.incr(),
                        _ => self.metrics.failures_other.incr(),
                    }
                    tracing::warn!(job_id = %job.id, error = %e, "job failed");
                }
            }
        }
        self.metrics.active_workers.decr();
    }

    async fn run_job<T, C, O, S>(
        &self,
        job: &mut Job,
        transcoder: &T,
        catalog: &C,
        object_store: &O,
        completion_sink: &S,
    ) -> Result<()>
    where
        T: Transcoder,
        C: SoundCatalog,
        O: ObjectStore,
        S: CompletionSink,
    {
        job.stage = Stage::Transcoding;
        self.set_status(job).await;
        let stage_start = Instant::now();
        let pcm = transcoder.transcode(job, self.config.sample_rate).await?;
        self.metrics.stage_duration.observe(stage_start.elapsed().as_secs_f64());

        if let AudioSource::Bytes(ref bytes) = job.source {
            let key = crate::collaborators::object_key(job.owner, ".raw");
            let _ = object_store.put(&key, bytes.clone(), "application/octet-stream").await;
        }

        job.stage = Stage::Fingerprinting;
        self.set_status(job).await;
        let fp = fingerprint_pcm(pcm, self.config.sample_rate)?;

        job.stage = Stage::Matching;
        self.set_status(job).await;
        let existing = catalog
            .lookup_by_hash(&fp.primary_hash)
            .await
            .map_err(|e| IngestError::CatalogUnavailable(e.to_string()))?;

        let (sound_id, confidence) = match existing {
            Some(sound) => {
                catalog
                    .increment_usage(sound.id)
                    .await
                    .map_err(|e| IngestError::CatalogUnavailable(e.to_string()))?;
                (sound.id, 1.0)
            }
            None => {
                let id = catalog
                    .create(NewSound {
                        creator: job.owner,
                        primary_hash: fp.primary_hash.clone(),
                        duration_secs: fp.duration_secs,
                        public: true,
                    })
                    .await
                    .map_err(|e| IngestError::CatalogUnavailable(e.to_string()))?;
                (id, 1.0)
            }
        };

        job.stage = Stage::Publishing;
        self.set_status(job).await;
        completion_sink
            .publish_completion(job.owner, job.id, sound_id, confidence)
            .await;

        Ok(())
    }
}
