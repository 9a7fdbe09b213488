//! Job lifecycle states and the transition table.
//!
//! State transitions:
//! - Pending -> Executing -> Finished
//! - Pending -> Executing -> Delayed -> Pending (retry loop, bounded by the policy)
//! - Pending -> Executing -> Failed (retry budget exhausted, or no policy)
//! - Waiting -> Pending (every dependency finished)
//! - Failed -> Delayed (manual retry)
//! - any non-terminal state -> Cancelled
//!
//! `TRANSITIONS` is the only place these rules live; every state change in
//! the crate goes through [`transition`].

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::JobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Ready to run.
    Pending,

    /// Blocked on unfinished dependencies.
    Waiting,

    /// Deferred until a backoff window elapses.
    Delayed,

    /// Currently handed to the executor.
    Executing,

    /// Completed successfully.
    Finished,

    /// Failed; only a manual retry can move it on.
    Failed,

    /// Cancelled by a caller.
    Cancelled,
}

/// Allowed next states, per current state.
const TRANSITIONS: &[(JobStatus, &[JobStatus])] = &[
    (
        JobStatus::Pending,
        &[JobStatus::Executing, JobStatus::Delayed, JobStatus::Cancelled],
    ),
    (JobStatus::Waiting, &[JobStatus::Pending, JobStatus::Cancelled]),
    (JobStatus::Delayed, &[JobStatus::Pending, JobStatus::Cancelled]),
    (
        JobStatus::Executing,
        &[
            JobStatus::Finished,
            JobStatus::Failed,
            JobStatus::Delayed,
            JobStatus::Cancelled,
        ],
    ),
    (JobStatus::Finished, &[]),
    (JobStatus::Failed, &[JobStatus::Delayed]),
    (JobStatus::Cancelled, &[]),
];

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        JobStatus::Pending,
        JobStatus::Waiting,
        JobStatus::Delayed,
        JobStatus::Executing,
        JobStatus::Finished,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    /// States reachable from `self` in one step.
    pub fn allowed_next(self) -> &'static [JobStatus] {
        TRANSITIONS
            .iter()
            .find(|(from, _)| *from == self)
            .map(|(_, next)| *next)
            .unwrap_or(&[])
    }

    /// Is this an absorbing state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Does the queue sweep pick up jobs in this state?
    pub fn is_sweepable(self) -> bool {
        matches!(
            self,
            JobStatus::Pending | JobStatus::Waiting | JobStatus::Delayed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Waiting => "WAITING",
            JobStatus::Delayed => "DELAYED",
            JobStatus::Executing => "EXECUTING",
            JobStatus::Finished => "FINISHED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn can_transition(current: JobStatus, next: JobStatus) -> bool {
    current.allowed_next().contains(&next)
}

/// Validate `current -> next` against the table.
pub fn transition(current: JobStatus, next: JobStatus) -> Result<JobStatus, JobError> {
    if can_transition(current, next) {
        Ok(next)
    } else {
        Err(JobError::InvalidTransition {
            from: current,
            to: next,
        })
    }
}
