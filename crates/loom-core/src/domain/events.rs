//! Queue lifecycle events.

use serde::Serialize;
use std::fmt;

use super::job::Job;

/// Event kinds a listener can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Completed,
    Failed,
    Retrying,
    NewJob,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Completed,
        EventKind::Failed,
        EventKind::Retrying,
        EventKind::NewJob,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Completed => "completed",
            EventKind::Failed => "failed",
            EventKind::Retrying => "retrying",
            EventKind::NewJob => "new_job",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event emitted by the queue. Every variant carries the persisted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    /// The job finished successfully.
    Completed { job: Job },

    /// The job failed for good.
    Failed { job: Job, error: String },

    /// The job failed and will be retried; `attempt` is the attempt about to
    /// be made (1-based).
    Retrying {
        job: Job,
        attempt: u32,
        error: String,
    },

    /// The job was accepted by `add_job`.
    NewJob { job: Job },
}

impl QueueEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            QueueEvent::Completed { .. } => EventKind::Completed,
            QueueEvent::Failed { .. } => EventKind::Failed,
            QueueEvent::Retrying { .. } => EventKind::Retrying,
            QueueEvent::NewJob { .. } => EventKind::NewJob,
        }
    }

    pub fn job(&self) -> &Job {
        match self {
            QueueEvent::Completed { job }
            | QueueEvent::Failed { job, .. }
            | QueueEvent::Retrying { job, .. }
            | QueueEvent::NewJob { job } => job,
        }
    }
}
