//! InMemoryWorkerRepository - development/test worker registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{RepositoryError, Worker, WorkerId};
use crate::ports::WorkerRepository;

#[derive(Clone, Default)]
pub struct InMemoryWorkerRepository {
    workers: Arc<RwLock<HashMap<WorkerId, Worker>>>,
}

impl InMemoryWorkerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a worker.
    pub async fn upsert(&self, worker: Worker) {
        self.workers
            .write()
            .await
            .insert(worker.id().clone(), worker);
    }
}

#[async_trait]
impl WorkerRepository for InMemoryWorkerRepository {
    async fn find_by_id(&self, id: &WorkerId) -> Result<Option<Worker>, RepositoryError> {
        Ok(self.workers.read().await.get(id).cloned())
    }
}
