//! Logging setup and queue status views.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::domain::{Job, JobStatus, QueueEvent};
use crate::ports::EventSink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Plain => f.write_str("plain"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// Install the global tracing subscriber, filtered by `RUST_LOG` (default
/// `info`).
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = match format {
        LogFormat::Plain => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(false)
            .try_init(),
    };
}

/// Number of jobs per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub waiting: usize,
    pub delayed: usize,
    pub executing: usize,
    pub finished: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl QueueCounts {
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        let mut counts = Self::default();
        for job in jobs {
            counts.record(job.status());
        }
        counts
    }

    fn record(&mut self, status: JobStatus) {
        let slot = match status {
            JobStatus::Pending => &mut self.pending,
            JobStatus::Waiting => &mut self.waiting,
            JobStatus::Delayed => &mut self.delayed,
            JobStatus::Executing => &mut self.executing,
            JobStatus::Finished => &mut self.finished,
            JobStatus::Failed => &mut self.failed,
            JobStatus::Cancelled => &mut self.cancelled,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        self.pending
            + self.waiting
            + self.delayed
            + self.executing
            + self.finished
            + self.failed
            + self.cancelled
    }

    /// No job is left for a sweep to move.
    pub fn is_settled(&self) -> bool {
        self.pending + self.waiting + self.delayed + self.executing == 0
    }
}

/// Writes every queue event to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &QueueEvent) {
        let job = event.job();
        match event {
            QueueEvent::Failed { error, .. } => {
                warn!(event = %event.kind(), job_id = %job.id(), attempts = job.attempts(), error = %error, "queue event");
            }
            QueueEvent::Retrying { attempt, error, .. } => {
                info!(event = %event.kind(), job_id = %job.id(), attempt, error = %error, "queue event");
            }
            QueueEvent::Completed { .. } | QueueEvent::NewJob { .. } => {
                info!(event = %event.kind(), job_id = %job.id(), status = %job.status(), "queue event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobName;
    use chrono::Utc;
    use rstest::rstest;

    #[test]
    fn counts_per_status() {
        let now = Utc::now();
        let pending = Job::builder(JobName::new("a").unwrap()).build(now);
        let cancelled = pending.cancel(now).unwrap();
        let running = pending.start(now).unwrap();

        let counts = QueueCounts::from_jobs([&pending, &cancelled, &running, &pending]);

        assert_eq!(counts.pending, 2);
        assert_eq!(counts.cancelled, 1);
        assert_eq!(counts.executing, 1);
        assert_eq!(counts.total(), 4);
        assert!(!counts.is_settled());
        assert!(QueueCounts::from_jobs([&cancelled]).is_settled());
    }

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("JSON", LogFormat::Json)]
    #[case("plain", LogFormat::Plain)]
    #[case("text", LogFormat::Plain)]
    fn log_format_parses(#[case] input: &str, #[case] expected: LogFormat) {
        assert_eq!(input.parse::<LogFormat>().unwrap(), expected);
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn init_twice_is_harmless() {
        init(LogFormat::Plain);
        init(LogFormat::Json);
    }
}
