//! Engine tuning knobs

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options for a [`ProcessInstance`](crate::ProcessInstance)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Seconds between periodic remaps of the target's memory
    pub remap_interval_secs: u64,
    /// Seconds between heartbeat checks of the creature vector
    pub heartbeat_interval_secs: u64,
    /// Milliseconds between throughput messages while scanning
    pub scan_rate_interval_ms: u64,
    /// Step size of the byte pattern scan
    pub pattern_step: usize,
    /// Step size of the heuristic vector scans
    pub vector_step: usize,
    /// Vectors longer than this are reported as a probable layout mismatch
    pub vector_warn_entries: u64,
    /// Vectors spanning more bytes than this are not read at all
    pub max_vector_bytes: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            remap_interval_secs: 20,
            heartbeat_interval_secs: 10,
            scan_rate_interval_ms: 500,
            pattern_step: 0x1000,
            vector_step: 0x10000,
            vector_warn_entries: 5000,
            max_vector_bytes: 64 * 1024 * 1024,
        }
    }
}

impl EngineOptions {
    pub fn remap_interval(&self) -> Duration {
        Duration::from_secs(self.remap_interval_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn scan_rate_interval(&self) -> Duration {
        Duration::from_millis(self.scan_rate_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = EngineOptions::default();
        assert_eq!(opts.remap_interval(), Duration::from_secs(20));
        assert_eq!(opts.pattern_step, 0x1000);
        assert_eq!(opts.vector_warn_entries, 5000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let opts: EngineOptions = toml::from_str("remap_interval_secs = 5").unwrap();
        assert_eq!(opts.remap_interval_secs, 5);
        assert_eq!(opts.vector_step, 0x10000);
    }
}
