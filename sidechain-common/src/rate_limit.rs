//! Token-bucket rate limiting keyed by an arbitrary identity (typically a
//! user id). Used to reject `Enqueue` calls once a user's outstanding work
//! crosses a configured threshold — the `Resource` error kind surfaced
//! immediately rather than queued.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// A per-key token bucket limiter. Not async: acquiring a token never
/// suspends, it either succeeds immediately or is rejected.
pub struct RateLimiter<K: Eq + Hash + Clone> {
    capacity: f64,
    refill_per_sec: f64,
    buckets: Mutex<HashMap<K, Bucket>>,
}

impl<K: Eq + Hash + Clone> RateLimiter<K> {
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_per_sec,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Attempts to take one token for `key`. Returns `true` if allowed.
    pub fn try_acquire(&self, key: &K) -> bool {
        let mut buckets = self.buckets.lock().unwrap();
        let now = Instant::now();
        let bucket = buckets.entry(key.clone()).or_insert_with(|| Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drops buckets that haven't been touched in `idle_for`, bounding
    /// memory for keys that stop producing traffic.
    pub fn sweep(&self, idle_for: Duration) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        buckets.retain(|_, b| now.duration_since(b.last_refill) < idle_for);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_then_refills() {
        let limiter = RateLimiter::new(2.0, 1000.0);
        assert!(limiter.try_acquire(&"u1"));
        assert!(limiter.try_acquire(&"u1"));
        assert!(!limiter.try_acquire(&"u1"));

        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.try_acquire(&"u1"));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1.0, 0.0);
        assert!(limiter.try_acquire(&"a"));
        assert!(limiter.try_acquire(&"b"));
        assert!(!limiter.try_acquire(&"a"));
    }
}
