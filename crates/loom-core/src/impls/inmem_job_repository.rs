//! InMemoryJobRepository - development/test job storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Job, JobId, RepositoryError};
use crate::ports::JobRepository;

/// Repository state.
#[derive(Default)]
struct JobTable {
    /// Snapshots by id.
    jobs: HashMap<JobId, Job>,

    /// Insertion order; `list()` follows it.
    order: Vec<JobId>,
}

/// In-memory job storage. Clones share the same table.
#[derive(Clone, Default)]
pub struct InMemoryJobRepository {
    table: Arc<RwLock<JobTable>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: Job) -> Result<Job, RepositoryError> {
        let mut table = self.table.write().await;
        if table.jobs.contains_key(job.id()) {
            return Err(RepositoryError::AlreadyExists(job.id().to_string()));
        }
        table.order.push(job.id().clone());
        table.jobs.insert(job.id().clone(), job.clone());
        Ok(job)
    }

    async fn save(&self, job: Job) -> Result<Job, RepositoryError> {
        let mut table = self.table.write().await;
        match table.jobs.get_mut(job.id()) {
            Some(slot) => {
                *slot = job.clone();
                Ok(job)
            }
            None => Err(RepositoryError::NotFound(job.id().to_string())),
        }
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.table.read().await.jobs.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Job>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table
            .order
            .iter()
            .filter_map(|id| table.jobs.get(id).cloned())
            .collect())
    }

    async fn find_by_ids(&self, ids: &[JobId]) -> Result<Vec<Job>, RepositoryError> {
        let table = self.table.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| table.jobs.get(id).cloned())
            .collect())
    }

    async fn find_dependent_jobs(&self, id: &JobId) -> Result<Vec<Job>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table
            .order
            .iter()
            .filter_map(|job_id| table.jobs.get(job_id))
            .filter(|job| job.dependencies().contains(id))
            .cloned()
            .collect())
    }
}
