//! Narrow collaborator traits matching spec §6 exactly. Production
//! implementations (real ffmpeg subprocess, relational sound catalog,
//! object store, hub publish) are injected by the binary that wires this
//! crate up; this crate only ships in-memory/test doubles, since the
//! concrete relational schema, object store, and hub are out of scope
//! per spec §1.

use crate::error::{IngestError, Result};
use crate::job::Job;
use async_trait::async_trait;
use sidechain_common::{JobId, PostId, SoundId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Shells out to an external audio tool (spec §6): `-i <input> -ac 1 -ar
/// {rate} -f f32le -`, producing little-endian 32-bit float PCM on
/// stdout, mono, at the target sample rate.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, job: &Job, sample_rate: u32) -> Result<Arc<Vec<f32>>>;
}

/// Canned-PCM transcoder for tests and local wiring: returns whatever
/// was registered for a job id, or a default sine wave.
pub struct FakeTranscoder {
    pcm_by_job: Mutex<HashMap<JobId, Arc<Vec<f32>>>>,
    fail_once_for: Mutex<Vec<JobId>>,
}

impl Default for FakeTranscoder {
    fn default() -> Self {
        Self {
            pcm_by_job: Mutex::new(HashMap::new()),
            fail_once_for: Mutex::new(Vec::new()),
        }
    }
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, job_id: JobId, pcm: Vec<f32>) {
        self.pcm_by_job.lock().await.insert(job_id, Arc::new(pcm));
    }

    /// Arranges for the next `transcode` call for `job_id` to fail with
    /// a retryable timeout, then succeed on the next attempt — used to
    /// exercise spec §8 scenario 3 (pipeline retry).
    pub async fn fail_once(&self, job_id: JobId) {
        self.fail_once_for.lock().await.push(job_id);
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, job: &Job, _sample_rate: u32) -> Result<Arc<Vec<f32>>> {
        let job_id = job.id;
        let mut fail_list = self.fail_once_for.lock().await;
        if let Some(pos) = fail_list.iter().position(|id| *id == job_id) {
            fail_list.remove(pos);
            return Err(IngestError::TranscodeTimeout);
        }
        drop(fail_list);

        let pcm = self.pcm_by_job.lock().await.get(&job_id).cloned();
        pcm.ok_or_else(|| IngestError::TranscodeFailed("no fixture registered".into()))
    }
}

/// A production implementation shelling out to `tokio::process::Command`
/// would live here; omitted because invoking a real ffmpeg binary is
/// outside what this workspace can exercise in tests, and the relevant
/// argv/behavior is fully specified by spec §6. Kept as a documented
/// extension point: a real implementation just runs
/// `Command::new("ffmpeg").args(["-i", path, "-ac", "1", "-ar", &rate.to_string(), "-f", "f32le", "-"])`
/// and decodes stdout as little-endian f32, converting a non-zero exit
/// with stderr into `TranscodeFailed`.
pub struct ProcessTranscoder {
    pub binary: String,
    pub timeout: Duration,
}

/// The catalog of known sounds, keyed by fingerprint primary hash
/// (spec §6).
#[async_trait]
pub trait SoundCatalog: Send + Sync {
    async fn lookup_by_hash(&self, hex: &str) -> Result<Option<SoundRecord>>;
    async fn create(&self, sound: NewSound) -> Result<SoundId>;
    async fn record_usage(&self, sound_id: SoundId, user_id: UserId, post_id: Option<PostId>) -> Result<()>;
    async fn increment_usage(&self, sound_id: SoundId) -> Result<()>;

    /// Fuzzy matching extension point (spec §9 Open Question (i)): not
    /// wired into the default match step, default implementation
    /// returns `None`.
    async fn lookup_fuzzy(&self, _hashes: &[u32], _threshold: f64) -> Result<Option<SoundRecord>> {
        Ok(None)
    }
}

#[derive(Debug, Clone)]
pub struct SoundRecord {
    pub id: SoundId,
    pub creator: UserId,
    pub usage_count: u64,
    pub duration_secs: f64,
    pub public: bool,
    pub primary_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewSound {
    pub creator: UserId,
    pub primary_hash: String,
    pub duration_secs: f64,
    pub public: bool,
}

/// In-memory reference `SoundCatalog`, conceptually the same
/// get/insert/increment shape as `pmocache::db::DB`, reimplemented over
/// a `HashMap` since the real relational schema is out of scope.
#[derive(Default)]
pub struct InMemoryCatalog {
    by_hash: Mutex<HashMap<String, SoundRecord>>,
    by_id: Mutex<HashMap<SoundId, String>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.by_hash.lock().await.len()
    }
}

#[async_trait]
impl SoundCatalog for InMemoryCatalog {
    async fn lookup_by_hash(&self, hex: &str) -> Result<Option<SoundRecord>> {
        Ok(self.by_hash.lock().await.get(hex).cloned())
    }

    async fn create(&self, sound: NewSound) -> Result<SoundId> {
        let id = SoundId::new();
        let record = SoundRecord {
            id,
            creator: sound.creator,
            usage_count: 1,
            duration_secs: sound.duration_secs,
            public: sound.public,
            primary_hash: sound.primary_hash.clone(),
        };
        let mut by_hash = self.by_hash.lock().await;
        // Uniqueness per primary hash (spec §3 Sound invariant).
        if by_hash.contains_key(&sound.primary_hash) {
            return Err(IngestError::CatalogUnavailable(
                "sound already exists for this primary hash".into(),
            ));
        }
        by_hash.insert(sound.primary_hash.clone(), record);
        self.by_id.lock().await.insert(id, sound.primary_hash);
        Ok(id)
    }

    async fn record_usage(&self, sound_id: SoundId, _user_id: UserId, _post_id: Option<PostId>) -> Result<()> {
        self.increment_usage(sound_id).await
    }

    async fn increment_usage(&self, sound_id: SoundId) -> Result<()> {
        let by_id = self.by_id.lock().await;
        let Some(hash) = by_id.get(&sound_id).cloned() else {
            return Err(IngestError::CatalogUnavailable("unknown sound id".into()));
        };
        drop(by_id);
        let mut by_hash = self.by_hash.lock().await;
        if let Some(record) = by_hash.get_mut(&hash) {
            record.usage_count += 1;
        }
        Ok(())
    }
}

/// Object Store collaborator (spec §6): keys organized as
/// `audio/{year}/{month}/{user id}/{uuid}{ext}`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Arc<Vec<u8>>, content_type: &str) -> Result<String>;
    async fn delete(&self, key: &str) -> Result<()>;
}

pub fn object_key(user_id: UserId, ext: &str) -> String {
    let now = chrono::Utc::now();
    format!(
        "audio/{}/{:02}/{}/{}{}",
        now.format("%Y"),
        now.format("%m").to_string().parse::<u32>().unwrap_or(1),
        user_id,
        uuid::Uuid::new_v4(),
        ext
    )
}

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Arc<Vec<u8>>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, bytes: Arc<Vec<u8>>, _content_type: &str) -> Result<String> {
        self.objects.lock().await.insert(key.to_string(), bytes);
        Ok(format!("memory://{key}"))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().await.remove(key);
        Ok(())
    }
}

/// Emits the pipeline's completion event onto the hub topic
/// `user:{owner}` (spec §4.1 step 7) without this crate taking a
/// dependency on `sidechain-hub` — the binary wiring the two together
/// implements this trait over its `Arc<Hub>`.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn publish_completion(
        &self,
        owner: UserId,
        job_id: JobId,
        sound_id: SoundId,
        confidence: f64,
    );
}

/// A sink that records completions in memory, for tests.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<(UserId, JobId, SoundId, f64)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CompletionSink for RecordingSink {
    async fn publish_completion(&self, owner: UserId, job_id: JobId, sound_id: SoundId, confidence: f64) {
        self.events.lock().await.push((owner, job_id, sound_id, confidence));
    }
}
