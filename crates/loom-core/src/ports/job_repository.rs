//! JobRepository port - the single source of truth for job snapshots.

use async_trait::async_trait;

use crate::domain::{Job, JobId, RepositoryError};

/// Storage contract for jobs.
///
/// The queue caches nothing between calls; every decision re-reads the
/// repository.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job. `AlreadyExists` if the id is taken.
    async fn create(&self, job: Job) -> Result<Job, RepositoryError>;

    /// Replace the stored snapshot. `NotFound` if the job was never created.
    async fn save(&self, job: Job) -> Result<Job, RepositoryError>;

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, RepositoryError>;

    /// Every job, in storage order.
    async fn list(&self) -> Result<Vec<Job>, RepositoryError>;

    /// Jobs matching `ids`; unknown ids are skipped.
    async fn find_by_ids(&self, ids: &[JobId]) -> Result<Vec<Job>, RepositoryError>;

    /// Jobs that list `id` among their dependencies.
    async fn find_dependent_jobs(&self, id: &JobId) -> Result<Vec<Job>, RepositoryError>;
}
