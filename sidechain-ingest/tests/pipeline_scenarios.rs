//! Integration tests covering spec §8 concrete scenarios 1-3: happy
//! path, dedup, and retry.

use sidechain_common::UserId;
use sidechain_ingest::{
    AudioSource, FakeTranscoder, IngestError, InMemoryCatalog, InMemoryObjectStore, IngestPipeline,
    Job, PipelineConfig, RecordingSink, Stage,
};
use std::sync::Arc;
use std::time::Duration;

fn sine_wave(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
    let n = (sample_rate as f32 * seconds) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * freq * t).sin()
        })
        .collect()
}

async fn wait_for_terminal(pipeline: &IngestPipeline, job_id: sidechain_common::JobId) -> Stage {
    for _ in 0..200 {
        if let Some(status) = pipeline.status(job_id).await {
            if status.stage.is_terminal() {
                return status.stage;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job did not reach a terminal stage in time");
}

#[tokio::test]
async fn happy_path_completes_and_creates_sound() {
    let transcoder = Arc::new(FakeTranscoder::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    let object_store = Arc::new(InMemoryObjectStore::new());
    let sink = Arc::new(RecordingSink::new());

    let pipeline = IngestPipeline::new(
        PipelineConfig {
            workers: 2,
            ..PipelineConfig::default()
        },
        transcoder.clone(),
        catalog.clone(),
        object_store,
        sink.clone(),
    );

    let owner = UserId::new();
    let job = Job::new(owner, AudioSource::Path("sine.wav".into()), "sine.wav");
    let job_id = job.id;
    transcoder.register(job_id, sine_wave(440.0, 8000, 10.0)).await;

    pipeline.enqueue(job).await.unwrap();

    let terminal = wait_for_terminal(&pipeline, job_id).await;
    assert_eq!(terminal, Stage::Completed);
    assert_eq!(catalog.len().await, 1);

    let events = sink.events.lock().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, owner);
    assert_eq!(events[0].3, 1.0);
}

#[tokio::test]
async fn resubmitting_identical_audio_hits_existing_sound() {
    let transcoder = Arc::new(FakeTranscoder::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    let object_store = Arc::new(InMemoryObjectStore::new());
    let sink = Arc::new(RecordingSink::new());

    let pipeline = IngestPipeline::new(
        PipelineConfig {
            workers: 2,
            ..PipelineConfig::default()
        },
        transcoder.clone(),
        catalog.clone(),
        object_store,
        sink.clone(),
    );

    let pcm = sine_wave(220.0, 8000, 10.0);
    let owner_a = UserId::new();
    let owner_b = UserId::new();

    let job_a = Job::new(owner_a, AudioSource::Path("a.wav".into()), "a.wav");
    transcoder.register(job_a.id, pcm.clone()).await;
    let job_a_id = job_a.id;
    pipeline.enqueue(job_a).await.unwrap();
    wait_for_terminal(&pipeline, job_a_id).await;

    let job_b = Job::new(owner_b, AudioSource::Path("b.wav".into()), "b.wav");
    transcoder.register(job_b.id, pcm).await;
    let job_b_id = job_b.id;
    pipeline.enqueue(job_b).await.unwrap();
    wait_for_terminal(&pipeline, job_b_id).await;

    // Exactly one Sound exists, usage_count incremented to 2.
    assert_eq!(catalog.len().await, 1);
    let events = sink.events.lock().await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].2, events[1].2, "both jobs matched the same sound");
    assert_eq!(events[1].3, 1.0, "second run hits with confidence 1.0");
}

#[tokio::test]
async fn transient_transcode_failure_is_retried_to_completion() {
    let transcoder = Arc::new(FakeTranscoder::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    let object_store = Arc::new(InMemoryObjectStore::new());
    let sink = Arc::new(RecordingSink::new());

    let pipeline = IngestPipeline::new(
        PipelineConfig {
            workers: 1,
            base_backoff_secs: 1,
            max_backoff_secs: 2,
            ..PipelineConfig::default()
        },
        transcoder.clone(),
        catalog,
        object_store,
        sink,
    );

    let owner = UserId::new();
    let job = Job::new(owner, AudioSource::Path("retry.wav".into()), "retry.wav");
    let job_id = job.id;
    transcoder.register(job_id, sine_wave(330.0, 8000, 10.0)).await;
    transcoder.fail_once(job_id).await;

    pipeline.enqueue(job).await.unwrap();

    // Allow enough time for one backoff cycle (base 1s, jittered).
    let terminal = wait_for_terminal(&pipeline, job_id).await;
    assert_eq!(terminal, Stage::Completed);

    let status = pipeline.status(job_id).await.unwrap();
    assert_eq!(status.attempt, 1, "one retry occurred before success");
}

#[tokio::test]
async fn queue_full_rejects_enqueue_without_blocking() {
    let transcoder = Arc::new(FakeTranscoder::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    let object_store = Arc::new(InMemoryObjectStore::new());
    let sink = Arc::new(RecordingSink::new());

    // Zero workers: nothing drains the queue, so the second enqueue
    // past capacity must fail fast rather than block.
    let pipeline = IngestPipeline::new(
        PipelineConfig {
            workers: 0,
            queue_capacity: 1,
            ..PipelineConfig::default()
        },
        transcoder,
        catalog,
        object_store,
        sink,
    );

    let owner = UserId::new();
    let job1 = Job::new(owner, AudioSource::Path("x.wav".into()), "x.wav");
    let job2 = Job::new(owner, AudioSource::Path("y.wav".into()), "y.wav");
    pipeline.enqueue(job1).await.unwrap();
    let result = pipeline.enqueue(job2).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn exhausted_rate_limit_rejects_without_touching_the_queue() {
    let transcoder = Arc::new(FakeTranscoder::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    let object_store = Arc::new(InMemoryObjectStore::new());
    let sink = Arc::new(RecordingSink::new());

    let pipeline = IngestPipeline::new(
        PipelineConfig {
            workers: 0,
            rate_limit_capacity: 1.0,
            rate_limit_refill_per_sec: 0.0,
            ..PipelineConfig::default()
        },
        transcoder,
        catalog,
        object_store,
        sink,
    );

    let owner = UserId::new();
    let job1 = Job::new(owner, AudioSource::Path("x.wav".into()), "x.wav");
    let job2 = Job::new(owner, AudioSource::Path("y.wav".into()), "y.wav");
    pipeline.enqueue(job1).await.unwrap();

    let result = pipeline.enqueue(job2).await;
    assert!(matches!(result, Err(IngestError::RateLimited)));

    // A different owner has its own bucket and is unaffected.
    let other = UserId::new();
    let job3 = Job::new(other, AudioSource::Path("z.wav".into()), "z.wav");
    pipeline.enqueue(job3).await.unwrap();
}
