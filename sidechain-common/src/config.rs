//! Process-wide configuration, loaded from an embedded default YAML and
//! overridden by `SIDECHAIN_CONFIG__*` environment variables.
//!
//! Simplified relative to a dynamic YAML `Value` tree (as in `pmoconfig`)
//! since the fields here are fixed and known up front; a typed struct with
//! `serde_yaml` deserialization and a handful of env overrides is enough.

use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_CONFIG: &str = include_str!("sidechain.yaml");
const ENV_PREFIX: &str = "SIDECHAIN_CONFIG__";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub base_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub transcode_timeout_secs: u64,
    /// Token-bucket capacity per submitting user for `enqueue` (spec §4.1
    /// backpressure, generalized beyond the shared queue to per-user abuse).
    pub rate_limit_capacity: f64,
    pub rate_limit_refill_per_sec: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus(),
            queue_capacity: 256,
            max_attempts: 5,
            base_backoff_secs: 2,
            max_backoff_secs: 60,
            transcode_timeout_secs: 120,
            rate_limit_capacity: 5.0,
            rate_limit_refill_per_sec: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub outbound_buffer: usize,
    pub read_idle_secs: u64,
    pub write_idle_secs: u64,
    pub presence_grace_secs: u64,
    pub max_frame_bytes: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: 256,
            read_idle_secs: 60,
            write_idle_secs: 30,
            presence_grace_secs: 30,
            max_frame_bytes: 1 << 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    pub fetch_multiplier: usize,
    pub tie_break_epsilon: f64,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            fetch_multiplier: 3,
            tie_break_epsilon: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SidechainConfig {
    pub ingest: IngestConfig,
    pub hub: HubConfig,
    pub ranker: RankerConfig,
}

impl SidechainConfig {
    pub fn load() -> anyhow::Result<Self> {
        let mut config: SidechainConfig = serde_yaml::from_str(DEFAULT_CONFIG)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        for (key, value) in env::vars() {
            let Some(path) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            self.apply_override(&path.to_lowercase(), &value);
        }
    }

    fn apply_override(&mut self, path: &str, value: &str) {
        macro_rules! parse_or_warn {
            ($field:expr, $ty:ty) => {
                match value.parse::<$ty>() {
                    Ok(v) => $field = v,
                    Err(e) => tracing::warn!("invalid override for {}: {}", path, e),
                }
            };
        }

        match path {
            "ingest__workers" => parse_or_warn!(self.ingest.workers, usize),
            "ingest__queue_capacity" => parse_or_warn!(self.ingest.queue_capacity, usize),
            "ingest__max_attempts" => parse_or_warn!(self.ingest.max_attempts, u32),
            "ingest__rate_limit_capacity" => parse_or_warn!(self.ingest.rate_limit_capacity, f64),
            "ingest__rate_limit_refill_per_sec" => {
                parse_or_warn!(self.ingest.rate_limit_refill_per_sec, f64)
            }
            "hub__outbound_buffer" => parse_or_warn!(self.hub.outbound_buffer, usize),
            "hub__read_idle_secs" => parse_or_warn!(self.hub.read_idle_secs, u64),
            "hub__presence_grace_secs" => parse_or_warn!(self.hub.presence_grace_secs, u64),
            "ranker__fetch_multiplier" => parse_or_warn!(self.ranker.fetch_multiplier, usize),
            _ => tracing::debug!("ignoring unknown config override: {}", path),
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

static CONFIG: once_cell::sync::OnceCell<SidechainConfig> = once_cell::sync::OnceCell::new();

/// Returns the process-wide configuration singleton, loading it from the
/// embedded default and environment overrides on first access.
pub fn get_config() -> &'static SidechainConfig {
    CONFIG.get_or_init(|| {
        SidechainConfig::load().expect("failed to load sidechain configuration")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_from_embedded_yaml() {
        let config = SidechainConfig::load().unwrap();
        assert_eq!(config.ingest.max_attempts, 5);
        assert_eq!(config.hub.outbound_buffer, 256);
    }

    #[test]
    fn env_override_takes_effect() {
        let mut config = SidechainConfig::default();
        config.apply_override("ingest__max_attempts", "9");
        assert_eq!(config.ingest.max_attempts, 9);
    }
}
