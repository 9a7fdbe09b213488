//! FnExecutor - adapts an async closure to `TaskExecutor`.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::Job;
use crate::ports::{ExecutionFailure, TaskExecutor};

type BoxedFuture = Pin<Box<dyn Future<Output = Result<Value, ExecutionFailure>> + Send>>;

/// Executor backed by a closure that receives an owned snapshot of the job.
///
/// ```ignore
/// let executor = FnExecutor::new(|job| async move {
///     Ok(serde_json::json!({ "echo": job.payload().clone() }))
/// });
/// ```
pub struct FnExecutor {
    handler: Box<dyn Fn(Job) -> BoxedFuture + Send + Sync>,
}

impl FnExecutor {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ExecutionFailure>> + Send + 'static,
    {
        Self {
            handler: Box::new(move |job: Job| -> BoxedFuture { Box::pin(handler(job)) }),
        }
    }
}

#[async_trait]
impl TaskExecutor for FnExecutor {
    async fn execute_task(&self, job: &Job) -> Result<Value, ExecutionFailure> {
        (self.handler)(job.clone()).await
    }
}
