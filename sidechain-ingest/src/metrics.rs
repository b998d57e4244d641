//! In-process observability facade (spec §4.1 "Observability"). A
//! metrics *backend* (Prometheus, etc.) is explicitly out of scope per
//! spec §1, but the counters/gauges/histograms the spec names still
//! need somewhere to live.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
pub struct Gauge(AtomicI64);

impl Gauge {
    pub fn set(&self, v: i64) {
        self.0.store(v, Ordering::Relaxed);
    }

    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decr(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A minimal histogram: count + sum, enough to derive an average
/// duration without pulling in a backend-specific bucket scheme.
#[derive(Default)]
pub struct Histogram {
    samples: Mutex<Vec<f64>>,
}

impl Histogram {
    pub fn observe(&self, value: f64) {
        self.samples.lock().unwrap().push(value);
    }

    pub fn count(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    pub fn mean(&self) -> f64 {
        let samples = self.samples.lock().unwrap();
        if samples.is_empty() {
            0.0
        } else {
            samples.iter().sum::<f64>() / samples.len() as f64
        }
    }
}

/// Named counters/gauges/histograms for the pipeline (spec §4.1).
#[derive(Default)]
pub struct PipelineMetrics {
    pub jobs_enqueued: Counter,
    pub jobs_completed: Counter,
    pub failures_transcode: Counter,
    pub failures_fingerprint: Counter,
    pub failures_other: Counter,
    pub dlq_size: Gauge,
    pub queue_depth: Gauge,
    pub active_workers: Gauge,
    pub end_to_end_duration: Histogram,
    pub stage_duration: Histogram,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let c = Counter::default();
        c.incr();
        c.add(4);
        assert_eq!(c.get(), 5);
    }

    #[test]
    fn histogram_tracks_mean() {
        let h = Histogram::default();
        h.observe(2.0);
        h.observe(4.0);
        assert_eq!(h.mean(), 3.0);
        assert_eq!(h.count(), 2);
    }
}
