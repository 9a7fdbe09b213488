//! Error types and their classification.

use thiserror::Error;

use super::ids::{JobId, WorkerId};
use super::state::JobStatus;
use super::worker::WorkerStatus;

/// Operational classification of an error.
///
/// - Transient: a later sweep may succeed (e.g. the worker is busy)
/// - Permanent: retrying the same call is pointless
/// - Infrastructure: the repository or another adapter failed
/// - Defect: a caller bypassed the aggregate's operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
    Defect,
}

/// Errors raised by the Job aggregate and value constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("job name must not be empty")]
    InvalidName,

    #[error("priority must be non-negative, got {0}")]
    InvalidPriority(i64),

    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(String),

    #[error("job {0} has no retry policy")]
    NoRetryPolicy(JobId),

    #[error("job {job_id} reached max attempts ({attempts}/{max_attempts})")]
    MaxAttemptsReached {
        job_id: JobId,
        attempts: u32,
        max_attempts: u32,
    },
}

/// Errors returned by repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors returned by the scheduling use cases (assignment, processing, queue).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("worker not found: {0}")]
    WorkerNotFound(WorkerId),

    #[error("worker id must not be empty")]
    InvalidWorkerId,

    #[error("worker {worker_id} is unavailable ({status})")]
    WorkerUnavailable {
        worker_id: WorkerId,
        status: WorkerStatus,
    },

    #[error("failed to resolve dependencies of job {job_id}: {source}")]
    DependencyResolution {
        job_id: JobId,
        #[source]
        source: RepositoryError,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::Job(JobError::InvalidTransition { .. }) => ErrorKind::Defect,
            SchedulerError::Job(_) => ErrorKind::Permanent,
            SchedulerError::JobNotFound(_)
            | SchedulerError::WorkerNotFound(_)
            | SchedulerError::InvalidWorkerId => ErrorKind::Permanent,
            SchedulerError::WorkerUnavailable { .. } => ErrorKind::Transient,
            SchedulerError::DependencyResolution { .. } | SchedulerError::Repository(_) => {
                ErrorKind::Infrastructure
            }
        }
    }
}
