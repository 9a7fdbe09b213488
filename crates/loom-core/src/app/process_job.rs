//! Process Job - drives one job through one lifecycle step.
//!
//! Steps, by status:
//! - Waiting: dependencies all finished -> Pending (their results merged into
//!   the payload), otherwise unchanged
//! - Delayed: worker unavailable or backoff window still open -> unchanged,
//!   otherwise started and executed
//! - Pending: worker unavailable -> unchanged, otherwise started and executed
//!
//! Execution outcomes:
//! - success -> Finished, executor result stored
//! - failure with retry budget -> Delayed, reported as `RetryPending`
//! - failure without budget -> Failed, reported as `Failed`
//!
//! This step never writes to the repository; the caller persists whatever
//! snapshot comes back.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{Job, JobStatus, JsonMap, SchedulerError, Worker};
use crate::ports::{Clock, JobRepository, TaskExecutor};

/// A step that did not end in success.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// The attempt failed and the job is delayed for `attempt`.
    #[error("job {} failed, retry {attempt} pending: {message}", .job.id())]
    RetryPending {
        job: Box<Job>,
        attempt: u32,
        message: String,
    },

    /// The attempt failed and the retry budget is spent (or there is none).
    #[error("job {} failed: {message}", .job.id())]
    Failed { job: Box<Job>, message: String },

    /// Nothing was applied to the job.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl ProcessError {
    /// Snapshot to persist, if the step produced one.
    pub fn job(&self) -> Option<&Job> {
        match self {
            ProcessError::RetryPending { job, .. } | ProcessError::Failed { job, .. } => Some(&**job),
            ProcessError::Scheduler(_) => None,
        }
    }
}

impl From<crate::domain::JobError> for ProcessError {
    fn from(err: crate::domain::JobError) -> Self {
        ProcessError::Scheduler(SchedulerError::Job(err))
    }
}

#[derive(Clone)]
pub struct ProcessJob {
    jobs: Arc<dyn JobRepository>,
    executor: Arc<dyn TaskExecutor>,
    clock: Arc<dyn Clock>,
}

impl ProcessJob {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        executor: Arc<dyn TaskExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            jobs,
            executor,
            clock,
        }
    }

    /// Run one step for `job` on `worker`. `Ok` with an identical snapshot
    /// means nothing happened.
    pub async fn execute(&self, job: &Job, worker: &Worker) -> Result<Job, ProcessError> {
        let now = self.clock.now();

        match job.status() {
            JobStatus::Waiting => return Ok(self.release_if_ready(job).await?),
            JobStatus::Delayed | JobStatus::Pending if !worker.is_available() => {
                debug!(job_id = %job.id(), worker_id = %worker.id(), "worker unavailable, skipping");
                return Ok(job.clone());
            }
            JobStatus::Delayed if !job.is_due(now) => {
                debug!(job_id = %job.id(), "backoff window still open");
                return Ok(job.clone());
            }
            _ => {}
        }

        let running = job.start(now)?;
        debug!(job_id = %running.id(), attempt = running.attempts() + 1, "executing job");

        let outcome = self.executor.execute_task(&running).await;
        let at = self.clock.now();

        match outcome {
            Ok(result) => {
                let finished = running.with_result(result, at).complete(at)?;
                info!(job_id = %finished.id(), "job finished");
                Ok(finished)
            }
            Err(failure) => {
                let attempts = running.attempts().saturating_add(1);
                let failed = running
                    .with_attempt(attempts, at)
                    .with_last_error(failure.message.clone(), at);

                if failed.can_be_retried() {
                    let delayed = failed.delay(at)?;
                    let delay_ms = u64::try_from(delayed.calculate_backoff_delay().as_millis())
                        .unwrap_or(u64::MAX);
                    warn!(
                        job_id = %delayed.id(),
                        attempts,
                        delay_ms,
                        error = %failure,
                        "job failed, retry scheduled"
                    );
                    Err(ProcessError::RetryPending {
                        job: Box::new(delayed),
                        attempt: attempts.saturating_add(1),
                        message: failure.message,
                    })
                } else {
                    let dead = failed.fail(at)?;
                    warn!(job_id = %dead.id(), attempts, error = %failure, "job failed");
                    Err(ProcessError::Failed {
                        job: Box::new(dead),
                        message: failure.message,
                    })
                }
            }
        }
    }

    /// Waiting -> Pending once every dependency has finished.
    async fn release_if_ready(&self, job: &Job) -> Result<Job, SchedulerError> {
        let Some(patch) = dependency_results(self.jobs.as_ref(), job).await? else {
            debug!(job_id = %job.id(), "dependencies not finished");
            return Ok(job.clone());
        };

        let pending = job.to_pending(Some(patch), self.clock.now())?;
        info!(job_id = %pending.id(), "dependencies finished, job released");
        Ok(pending)
    }
}

/// Load every dependency of `job`. A dependency the repository does not know
/// is `JobNotFound`.
pub(crate) async fn find_dependencies(
    jobs: &dyn JobRepository,
    job: &Job,
) -> Result<Vec<Job>, SchedulerError> {
    let found = jobs
        .find_by_ids(job.dependencies())
        .await
        .map_err(|source| SchedulerError::DependencyResolution {
            job_id: job.id().clone(),
            source,
        })?;

    if let Some(missing) = job
        .dependencies()
        .iter()
        .find(|id| !found.iter().any(|dep| dep.id() == *id))
    {
        return Err(SchedulerError::JobNotFound(missing.clone()));
    }
    Ok(found)
}

/// Results of `job`'s dependencies keyed by dependency id, or `None` while
/// any of them is unfinished.
pub(crate) async fn dependency_results(
    jobs: &dyn JobRepository,
    job: &Job,
) -> Result<Option<JsonMap>, SchedulerError> {
    let dependencies = find_dependencies(jobs, job).await?;

    if dependencies
        .iter()
        .any(|dep| dep.status() != JobStatus::Finished)
    {
        return Ok(None);
    }

    Ok(Some(
        dependencies
            .into_iter()
            .map(|dep| {
                let result = dep.result().cloned().unwrap_or(serde_json::Value::Null);
                (dep.id().to_string(), result)
            })
            .collect(),
    ))
}
