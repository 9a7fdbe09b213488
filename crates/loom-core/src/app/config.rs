//! Queue configuration.

use serde::Deserialize;
use std::time::Duration;

use crate::domain::WorkerId;

/// Settings for a [`JobQueue`](super::JobQueue) and its sweeper.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Name used in logs.
    pub name: String,
    /// Worker slot whose availability gates execution during a sweep.
    pub worker_id: WorkerId,
    /// Pause between sweeps.
    pub sweep_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "loom".to_string(),
            worker_id: WorkerId::new("worker-default"),
            sweep_interval_ms: 1_000,
        }
    }
}

impl QueueConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_worker_id(mut self, worker_id: WorkerId) -> Self {
        self.worker_id = worker_id;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}
