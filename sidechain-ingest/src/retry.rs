//! Exponential backoff with jitter for retryable failures (spec §4.1
//! "Retry policy"): base 2s, doubling, capped at 60s, ±25% jitter.

use rand::Rng;
use std::time::Duration;

pub fn backoff_for_attempt(attempt: u32, base_secs: u64, max_secs: u64) -> Duration {
    let exp = base_secs.saturating_mul(1u64 << attempt.min(20));
    let capped = exp.min(max_secs);

    let mut rng = rand::rng();
    let jitter_frac: f64 = rng.random_range(-0.25..=0.25);
    let jittered = (capped as f64) * (1.0 + jitter_frac);
    Duration::from_secs_f64(jittered.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        for attempt in 0..10 {
            let d = backoff_for_attempt(attempt, 2, 60);
            let expected_center = (2u64 << attempt).min(60) as f64;
            let secs = d.as_secs_f64();
            assert!(secs <= expected_center * 1.26, "attempt {attempt}: {secs} > {expected_center}");
            assert!(secs >= (expected_center * 0.74).max(0.0), "attempt {attempt}: {secs} < {expected_center}");
        }
    }
}
