//! WorkerRepository port.

use async_trait::async_trait;

use crate::domain::{RepositoryError, Worker, WorkerId};

#[async_trait]
pub trait WorkerRepository: Send + Sync {
    async fn find_by_id(&self, id: &WorkerId) -> Result<Option<Worker>, RepositoryError>;
}
