use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing knobs of the success monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorPolicy {
    /// Location polling period for `url_change`.
    pub poll_interval_ms: u64,
    /// Used when a watch request carries `timeoutMs: 0`.
    pub default_timeout_ms: u64,
}

impl Default for MonitorPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            default_timeout_ms: formfill_core_types::DEFAULT_MONITOR_TIMEOUT_MS,
        }
    }
}

impl MonitorPolicy {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn effective_timeout_ms(&self, requested_ms: u64) -> u64 {
        if requested_ms == 0 {
            self.default_timeout_ms
        } else {
            requested_ms
        }
    }
}
