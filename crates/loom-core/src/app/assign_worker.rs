//! Worker assignment.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{SchedulerError, Worker, WorkerId};
use crate::ports::WorkerRepository;

/// Resolves a worker id to a worker that can take a job right now.
///
/// Assignment is a read: the worker's persisted status is not changed.
#[derive(Clone)]
pub struct WorkerAssignment {
    workers: Arc<dyn WorkerRepository>,
}

impl WorkerAssignment {
    pub fn new(workers: Arc<dyn WorkerRepository>) -> Self {
        Self { workers }
    }

    pub async fn assign_worker(&self, worker_id: &WorkerId) -> Result<Worker, SchedulerError> {
        if worker_id.is_empty() {
            return Err(SchedulerError::InvalidWorkerId);
        }

        let worker = self
            .workers
            .find_by_id(worker_id)
            .await?
            .ok_or_else(|| SchedulerError::WorkerNotFound(worker_id.clone()))?;

        if !worker.is_available() {
            return Err(SchedulerError::WorkerUnavailable {
                worker_id: worker_id.clone(),
                status: worker.status(),
            });
        }

        debug!(worker_id = %worker_id, "worker assigned");
        Ok(worker)
    }
}
