//! Audio Ingest Pipeline: a bounded, retrying background queue that
//! transcodes uploaded audio, extracts spectral peaks, computes a
//! content-addressable acoustic fingerprint, and matches it against a
//! catalog of known sounds. Depends on `sidechain-common`; publishes
//! into `sidechain-hub` only through the `CompletionSink` trait defined
//! here, never a reverse crate dependency (spec §2).

pub mod collaborators;
pub mod error;
pub mod fingerprint;
pub mod job;
pub mod metrics;
pub mod pipeline;
pub mod retry;

pub use collaborators::{
    object_key, CompletionSink, FakeTranscoder, InMemoryCatalog, InMemoryObjectStore, NewSound,
    ObjectStore, ProcessTranscoder, RecordingSink, SoundCatalog, SoundRecord, Transcoder,
};
pub use error::{IngestError, Result};
pub use fingerprint::{fingerprint_pcm, jaccard_similarity, Fingerprint, Peak};
pub use job::{AudioSource, Job, JobStatus, Stage};
pub use metrics::PipelineMetrics;
pub use pipeline::{IngestPipeline, PipelineConfig};
