//! TaskExecutor port - runs a job's payload.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::Job;

/// Failure reported by an executor. The message is kept on the job as its
/// `last_error` and carried by `retrying` / `failed` events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExecutionFailure {
    pub message: String,
}

impl ExecutionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Executes the business logic behind a job.
///
/// Implementations must not touch the job's lifecycle; the queue applies the
/// outcome.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute_task(&self, job: &Job) -> Result<Value, ExecutionFailure>;
}
