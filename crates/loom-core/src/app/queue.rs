//! JobQueue - enqueue, sweep, cascade and lifecycle events.
//!
//! The repository is the only state: every sweep lists jobs afresh and
//! re-reads each one right before stepping it, so a job released earlier in
//! the same sweep (by the dependent cascade) is seen in its new state.
//! Jobs are stepped one at a time, in repository order; priority does not
//! reorder the sweep.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::assign_worker::WorkerAssignment;
use super::config::QueueConfig;
use super::events::EventBus;
use super::process_job::{ProcessError, ProcessJob, dependency_results, find_dependencies};
use crate::domain::{EventKind, Job, JobId, JobStatus, QueueEvent, SchedulerError, Worker, WorkerId};
use crate::observability::QueueCounts;
use crate::ports::{Clock, JobRepository, TaskExecutor, WorkerRepository};

/// Tally of one `process_jobs()` sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Jobs that were eligible when the sweep listed them.
    pub examined: usize,
    /// Jobs that moved without finishing or failing (e.g. Waiting -> Pending).
    ///
    /// A job the sweep itself releases from Waiting runs on the next sweep.
    /// A job released by the cascade of a dependency that finished earlier in
    /// this sweep runs in this one, when it comes later in repository order.
    pub advanced: usize,
    pub completed: usize,
    pub retrying: usize,
    pub failed: usize,
    /// Jobs whose step raised an error; they are left as they were.
    pub errored: usize,
}

impl SweepReport {
    pub fn changed(&self) -> usize {
        self.advanced + self.completed + self.retrying + self.failed
    }
}

/// What one step did to a job.
#[derive(Debug)]
enum Step {
    Unchanged(Job),
    Advanced(Job),
    Completed(Job),
    Retrying(Job),
    Failed(Job),
}

impl Step {
    fn into_job(self) -> Job {
        match self {
            Step::Unchanged(job)
            | Step::Advanced(job)
            | Step::Completed(job)
            | Step::Retrying(job)
            | Step::Failed(job) => job,
        }
    }
}

pub struct JobQueue {
    jobs: Arc<dyn JobRepository>,
    workers: Arc<dyn WorkerRepository>,
    clock: Arc<dyn Clock>,
    config: QueueConfig,
    processor: ProcessJob,
    assignment: WorkerAssignment,
    events: EventBus,
}

impl JobQueue {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        workers: Arc<dyn WorkerRepository>,
        executor: Arc<dyn TaskExecutor>,
        clock: Arc<dyn Clock>,
        config: QueueConfig,
    ) -> Self {
        Self {
            processor: ProcessJob::new(jobs.clone(), executor, clock.clone()),
            assignment: WorkerAssignment::new(workers.clone()),
            jobs,
            workers,
            clock,
            config,
            events: EventBus::new(),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Register a callback for one kind of event.
    pub fn on<F>(&self, kind: EventKind, callback: F)
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, callback);
    }

    pub fn subscribe(&self) -> tokio::sync::mpsc::UnboundedReceiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Accept a new job.
    ///
    /// Every dependency must already exist. If any of them has not finished
    /// the job is stored as Waiting; otherwise it is stored as given.
    #[instrument(skip_all, fields(queue = %self.config.name, job_id = %job.id()))]
    pub async fn add_job(&self, job: Job) -> Result<Job, SchedulerError> {
        let job = if job.has_dependencies() {
            self.gate_on_dependencies(job).await?
        } else {
            job
        };

        let created = self.jobs.create(job).await?;
        info!(status = %created.status(), priority = created.priority().value(), "job added");
        self.events.publish(QueueEvent::NewJob {
            job: created.clone(),
        });
        Ok(created)
    }

    async fn gate_on_dependencies(&self, job: Job) -> Result<Job, SchedulerError> {
        let found = find_dependencies(self.jobs.as_ref(), &job).await?;

        let unmet = found.iter().any(|dep| dep.status() != JobStatus::Finished);
        if unmet && job.status() != JobStatus::Waiting {
            debug!(job_id = %job.id(), "dependencies unfinished, parking job");
            let now = self.clock.now();
            return Ok(job
                .rebuild()
                .status(JobStatus::Waiting)
                .updated_at(now)
                .build(now));
        }
        Ok(job)
    }

    /// One sweep over every Pending, Waiting and Delayed job.
    ///
    /// A failing job step is logged and counted in `errored`; the sweep moves
    /// on. Only listing the jobs or loading the configured worker aborts it.
    #[instrument(skip_all, fields(queue = %self.config.name))]
    pub async fn process_jobs(&self) -> Result<SweepReport, SchedulerError> {
        let worker = self
            .workers
            .find_by_id(&self.config.worker_id)
            .await?
            .ok_or_else(|| SchedulerError::WorkerNotFound(self.config.worker_id.clone()))?;

        let listed = self.jobs.list().await?;
        let mut report = SweepReport::default();

        for listed_job in listed.iter().filter(|job| job.status().is_sweepable()) {
            report.examined += 1;

            let current = match self.jobs.find_by_id(listed_job.id()).await {
                Ok(Some(job)) if job.status().is_sweepable() => job,
                Ok(_) => continue,
                Err(err) => {
                    warn!(job_id = %listed_job.id(), error = %err, "failed to reload job");
                    report.errored += 1;
                    continue;
                }
            };

            match self.step(&current, &worker).await {
                Ok(Step::Unchanged(_)) => {}
                Ok(Step::Advanced(_)) => report.advanced += 1,
                Ok(Step::Completed(_)) => report.completed += 1,
                Ok(Step::Retrying(_)) => report.retrying += 1,
                Ok(Step::Failed(_)) => report.failed += 1,
                Err(err) => {
                    warn!(job_id = %current.id(), error = %err, kind = ?err.kind(), "job step failed");
                    report.errored += 1;
                }
            }
        }

        debug!(?report, "sweep finished");
        Ok(report)
    }

    /// Run one step for a single job on a specific worker, outside the sweep.
    #[instrument(skip_all, fields(queue = %self.config.name, job_id = %job_id, worker_id = %worker_id))]
    pub async fn run_job(&self, job_id: &JobId, worker_id: &WorkerId) -> Result<Job, SchedulerError> {
        let worker = self.assignment.assign_worker(worker_id).await?;
        let job = self.load(job_id).await?;
        Ok(self.step(&job, &worker).await?.into_job())
    }

    pub async fn cancel_job(&self, job_id: &JobId) -> Result<Job, SchedulerError> {
        let job = self.load(job_id).await?;
        let cancelled = job.cancel(self.clock.now())?;
        let saved = self.jobs.save(cancelled).await?;
        info!(job_id = %job_id, "job cancelled");
        Ok(saved)
    }

    /// Put a failed job back on the retry path (Failed -> Delayed).
    pub async fn retry_job(&self, job_id: &JobId) -> Result<Job, SchedulerError> {
        let job = self.load(job_id).await?;
        let delayed = job.retry(self.clock.now())?;
        let saved = self.jobs.save(delayed).await?;
        info!(job_id = %job_id, attempts = saved.attempts(), "job queued for retry");
        Ok(saved)
    }

    pub async fn job(&self, job_id: &JobId) -> Result<Job, SchedulerError> {
        self.load(job_id).await
    }

    pub async fn counts(&self) -> Result<QueueCounts, SchedulerError> {
        let jobs = self.jobs.list().await?;
        Ok(QueueCounts::from_jobs(&jobs))
    }

    async fn load(&self, job_id: &JobId) -> Result<Job, SchedulerError> {
        self.jobs
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.clone()))
    }

    /// Process, persist, emit.
    async fn step(&self, job: &Job, worker: &Worker) -> Result<Step, SchedulerError> {
        match self.processor.execute(job, worker).await {
            Ok(next) if next == *job => Ok(Step::Unchanged(next)),
            Ok(next) => {
                let saved = self.jobs.save(next).await?;
                if saved.status() != JobStatus::Finished {
                    return Ok(Step::Advanced(saved));
                }
                self.events.publish(QueueEvent::Completed { job: saved.clone() });
                if let Err(err) = self.release_dependents(&saved).await {
                    // Waiting dependents are re-checked by every sweep.
                    warn!(job_id = %saved.id(), error = %err, "dependent cascade failed");
                }
                Ok(Step::Completed(saved))
            }
            Err(ProcessError::RetryPending {
                job,
                attempt,
                message,
            }) => {
                let saved = self.jobs.save(*job).await?;
                self.events.publish(QueueEvent::Retrying {
                    job: saved.clone(),
                    attempt,
                    error: message,
                });
                Ok(Step::Retrying(saved))
            }
            Err(ProcessError::Failed { job, message }) => {
                let saved = self.jobs.save(*job).await?;
                self.events.publish(QueueEvent::Failed {
                    job: saved.clone(),
                    error: message,
                });
                Ok(Step::Failed(saved))
            }
            Err(ProcessError::Scheduler(err)) => Err(err),
        }
    }

    /// Release every Waiting dependent of `completed` whose dependencies
    /// have now all finished.
    async fn release_dependents(&self, completed: &Job) -> Result<(), SchedulerError> {
        let dependents = self
            .jobs
            .find_dependent_jobs(completed.id())
            .await
            .map_err(|source| SchedulerError::DependencyResolution {
                job_id: completed.id().clone(),
                source,
            })?;

        for dependent in dependents
            .into_iter()
            .filter(|job| job.status() == JobStatus::Waiting)
        {
            let Some(patch) = dependency_results(self.jobs.as_ref(), &dependent).await? else {
                continue;
            };
            let released = dependent.to_pending(Some(patch), self.clock.now())?;
            self.jobs.save(released).await?;
            info!(job_id = %dependent.id(), after = %completed.id(), "dependent released");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobName, JsonMap, Priority, RepositoryError, RetryPolicy, WorkerStatus};
    use crate::impls::{FnExecutor, InMemoryJobRepository, InMemoryWorkerRepository};
    use crate::ports::{ExecutionFailure, FixedClock};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    struct Harness {
        queue: JobQueue,
        jobs: InMemoryJobRepository,
        workers: InMemoryWorkerRepository,
        clock: FixedClock,
        seen_payloads: Arc<Mutex<Vec<(String, JsonMap)>>>,
    }

    /// Executor behaviour: jobs named `fail` always fail, everything else
    /// returns `{"from": <id>}`.
    async fn harness() -> Harness {
        let jobs = InMemoryJobRepository::new();
        let workers = InMemoryWorkerRepository::new();
        workers
            .upsert(Worker::new(
                WorkerId::new("worker-1"),
                "w1",
                WorkerStatus::Available,
                t0(),
            ))
            .await;
        let clock = FixedClock::new(t0());
        let seen_payloads = Arc::new(Mutex::new(Vec::new()));

        let seen = seen_payloads.clone();
        let executor = FnExecutor::new(move |job: Job| {
            let seen = seen.clone();
            async move {
                seen.lock()
                    .unwrap()
                    .push((job.id().to_string(), job.payload().clone()));
                if job.name().as_str() == "fail" {
                    Err(ExecutionFailure::new("boom"))
                } else {
                    Ok(json!({ "from": job.id().as_str() }))
                }
            }
        });

        let queue = JobQueue::new(
            Arc::new(jobs.clone()),
            Arc::new(workers.clone()),
            Arc::new(executor),
            Arc::new(clock.clone()),
            QueueConfig::default().with_worker_id(WorkerId::new("worker-1")),
        );

        Harness {
            queue,
            jobs,
            workers,
            clock,
            seen_payloads,
        }
    }

    fn job(id: &str, deps: &[&str]) -> Job {
        Job::builder(JobName::new(id).unwrap())
            .id(JobId::new(id))
            .dependencies(deps.iter().map(|d| JobId::new(*d)))
            .build(t0())
    }

    fn failing(id: &str, policy: Option<RetryPolicy>) -> Job {
        let builder = Job::builder(JobName::new("fail").unwrap()).id(JobId::new(id));
        match policy {
            Some(policy) => builder.retry_policy(policy).build(t0()),
            None => builder.build(t0()),
        }
    }

    fn record_kinds(queue: &JobQueue) -> Arc<Mutex<Vec<(EventKind, String)>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        for kind in EventKind::ALL {
            let log = log.clone();
            queue.on(kind, move |event| {
                log.lock()
                    .unwrap()
                    .push((event.kind(), event.job().id().to_string()));
            });
        }
        log
    }

    async fn status(h: &Harness, id: &str) -> JobStatus {
        h.queue.job(&JobId::new(id)).await.unwrap().status()
    }

    #[tokio::test]
    async fn add_job_without_dependencies_is_pending() {
        let h = harness().await;
        let events = record_kinds(&h.queue);

        let added = h.queue.add_job(job("a", &[])).await.unwrap();

        assert_eq!(added.status(), JobStatus::Pending);
        assert_eq!(
            *events.lock().unwrap(),
            vec![(EventKind::NewJob, "a".to_string())]
        );
    }

    #[tokio::test]
    async fn add_job_with_unfinished_dependencies_waits() {
        let h = harness().await;
        h.queue.add_job(job("a", &[])).await.unwrap();
        h.queue.add_job(job("b", &[])).await.unwrap();

        let pending_with_deps = job("c", &[])
            .add_dependency(JobId::new("a"), t0())
            .add_dependency(JobId::new("b"), t0());
        assert_eq!(pending_with_deps.status(), JobStatus::Pending);

        let added = h.queue.add_job(pending_with_deps).await.unwrap();
        assert_eq!(added.status(), JobStatus::Waiting);
        assert_eq!(status(&h, "c").await, JobStatus::Waiting);
    }

    #[tokio::test]
    async fn add_job_with_unknown_dependency_is_rejected() {
        let h = harness().await;
        let err = h.queue.add_job(job("c", &["ghost"])).await.unwrap_err();

        assert_eq!(err, SchedulerError::JobNotFound(JobId::new("ghost")));
        assert!(h.jobs.is_empty().await);
    }

    #[tokio::test]
    async fn sweep_completes_jobs_and_releases_dependents_once() {
        let h = harness().await;
        h.queue.add_job(job("a", &[])).await.unwrap();
        h.queue.add_job(job("b", &[])).await.unwrap();
        h.queue.add_job(job("c", &["a", "b"])).await.unwrap();
        let events = record_kinds(&h.queue);

        let report = h.queue.process_jobs().await.unwrap();

        // a and b complete; the cascade releases c, which then runs in the same sweep.
        assert_eq!(report.examined, 3);
        assert_eq!(report.completed, 3);
        assert_eq!(report.errored, 0);
        assert_eq!(status(&h, "c").await, JobStatus::Finished);

        let seen = h.seen_payloads.lock().unwrap().clone();
        let (_, payload) = seen.iter().find(|(id, _)| id == "c").unwrap();
        assert_eq!(payload["a"], json!({ "from": "a" }));
        assert_eq!(payload["b"], json!({ "from": "b" }));

        let kinds: Vec<(EventKind, String)> = events.lock().unwrap().clone();
        assert_eq!(
            kinds,
            vec![
                (EventKind::Completed, "a".to_string()),
                (EventKind::Completed, "b".to_string()),
                (EventKind::Completed, "c".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn dependent_waits_until_every_dependency_finishes() {
        let h = harness().await;
        h.queue.add_job(job("a", &[])).await.unwrap();
        h.queue
            .add_job(failing("f", Some(RetryPolicy::fixed(5, Duration::from_secs(60)).unwrap())))
            .await
            .unwrap();
        h.queue.add_job(job("c", &["a", "f"])).await.unwrap();

        let report = h.queue.process_jobs().await.unwrap();

        assert_eq!(report.completed, 1);
        assert_eq!(report.retrying, 1);
        assert_eq!(status(&h, "c").await, JobStatus::Waiting);
        assert!(h.seen_payloads.lock().unwrap().iter().all(|(id, _)| id != "c"));
    }

    #[tokio::test]
    async fn retries_follow_the_backoff_and_then_fail() {
        let h = harness().await;
        let policy = RetryPolicy::exponential(3, Duration::from_secs(1))
            .unwrap()
            .with_max_delay(Duration::from_secs(5));
        h.queue.add_job(failing("f", Some(policy))).await.unwrap();

        let retries = Arc::new(Mutex::new(Vec::new()));
        let r = retries.clone();
        h.queue.on(EventKind::Retrying, move |event| {
            if let QueueEvent::Retrying { attempt, error, job } = event {
                r.lock()
                    .unwrap()
                    .push((*attempt, error.clone(), job.calculate_backoff_delay()));
            }
        });
        let failures = Arc::new(AtomicUsize::new(0));
        let f = failures.clone();
        h.queue.on(EventKind::Failed, move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });

        h.queue.process_jobs().await.unwrap();
        assert_eq!(status(&h, "f").await, JobStatus::Delayed);

        // Window still open: nothing runs.
        h.clock.advance(chrono::Duration::milliseconds(3_999));
        let report = h.queue.process_jobs().await.unwrap();
        assert_eq!(report.changed(), 0);

        h.clock.advance(chrono::Duration::milliseconds(1));
        h.queue.process_jobs().await.unwrap();
        h.clock.advance(chrono::Duration::seconds(5));
        let report = h.queue.process_jobs().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(
            *retries.lock().unwrap(),
            vec![
                (2, "boom".to_string(), Duration::from_secs(4)),
                (3, "boom".to_string(), Duration::from_secs(5)),
            ]
        );
        assert_eq!(failures.load(Ordering::SeqCst), 1);

        let failed = h.queue.job(&JobId::new("f")).await.unwrap();
        assert_eq!(failed.status(), JobStatus::Failed);
        assert_eq!(failed.attempts(), 3);
        assert_eq!(failed.last_error(), Some("boom"));
    }

    #[tokio::test]
    async fn unavailable_worker_only_lets_waiting_jobs_move() {
        let h = harness().await;
        h.workers
            .upsert(Worker::new(
                WorkerId::new("worker-1"),
                "w1",
                WorkerStatus::Busy,
                t0(),
            ))
            .await;
        h.queue.add_job(job("a", &[])).await.unwrap();

        let report = h.queue.process_jobs().await.unwrap();

        assert_eq!(report.examined, 1);
        assert_eq!(report.changed(), 0);
        assert_eq!(status(&h, "a").await, JobStatus::Pending);
        assert!(h.seen_payloads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sweep_needs_the_configured_worker() {
        let h = harness().await;
        let queue = JobQueue::new(
            Arc::new(h.jobs.clone()),
            Arc::new(h.workers.clone()),
            Arc::new(FnExecutor::new(|_job: Job| async { Ok::<_, ExecutionFailure>(Value::Null) })),
            Arc::new(h.clock.clone()),
            QueueConfig::default().with_worker_id(WorkerId::new("worker-404")),
        );

        assert_eq!(
            queue.process_jobs().await,
            Err(SchedulerError::WorkerNotFound(WorkerId::new("worker-404")))
        );
    }

    #[tokio::test]
    async fn cancelled_jobs_are_skipped_and_cannot_be_cancelled_again() {
        let h = harness().await;
        h.queue.add_job(job("a", &[])).await.unwrap();

        let cancelled = h.queue.cancel_job(&JobId::new("a")).await.unwrap();
        assert_eq!(cancelled.status(), JobStatus::Cancelled);

        let report = h.queue.process_jobs().await.unwrap();
        assert_eq!(report.examined, 0);

        let err = h.queue.cancel_job(&JobId::new("a")).await.unwrap_err();
        assert_eq!(
            err,
            SchedulerError::Job(crate::domain::JobError::InvalidTransition {
                from: JobStatus::Cancelled,
                to: JobStatus::Cancelled,
            })
        );
        assert_eq!(status(&h, "a").await, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn retry_job_rejects_exhausted_and_policyless_jobs() {
        let h = harness().await;
        h.queue
            .add_job(failing("f", Some(RetryPolicy::fixed(2, Duration::from_secs(1)).unwrap())))
            .await
            .unwrap();
        h.queue
            .add_job(failing("g", None))
            .await
            .unwrap();

        // f: attempt 1 fails -> Delayed; g: no policy -> Failed.
        h.queue.process_jobs().await.unwrap();
        h.clock.advance(chrono::Duration::seconds(1));
        // f: attempt 2 fails -> Failed (budget 2).
        h.queue.process_jobs().await.unwrap();
        assert_eq!(status(&h, "f").await, JobStatus::Failed);

        assert!(matches!(
            h.queue.retry_job(&JobId::new("f")).await,
            Err(SchedulerError::Job(crate::domain::JobError::MaxAttemptsReached { .. }))
        ));
        assert!(matches!(
            h.queue.retry_job(&JobId::new("g")).await,
            Err(SchedulerError::Job(crate::domain::JobError::NoRetryPolicy(_)))
        ));
    }

    #[tokio::test]
    async fn manual_retry_with_budget_left() {
        let h = harness().await;
        // Rehydrated as failed after one attempt, with budget for three.
        let failed = Job::builder(JobName::new("fail").unwrap())
            .id(JobId::new("f"))
            .status(JobStatus::Failed)
            .attempts(1)
            .retry_policy(RetryPolicy::fixed(3, Duration::from_secs(1)).unwrap())
            .build(t0());
        h.jobs.create(failed).await.unwrap();

        let delayed = h.queue.retry_job(&JobId::new("f")).await.unwrap();
        assert_eq!(delayed.status(), JobStatus::Delayed);

        h.clock.advance(chrono::Duration::seconds(1));
        let report = h.queue.process_jobs().await.unwrap();
        assert_eq!(report.retrying, 1);
    }

    #[tokio::test]
    async fn run_job_assigns_the_worker_first() {
        let h = harness().await;
        h.workers
            .upsert(Worker::new(
                WorkerId::new("worker-2"),
                "w2",
                WorkerStatus::Offline,
                t0(),
            ))
            .await;
        h.queue.add_job(job("a", &[])).await.unwrap();

        assert!(matches!(
            h.queue
                .run_job(&JobId::new("a"), &WorkerId::new("worker-2"))
                .await,
            Err(SchedulerError::WorkerUnavailable { .. })
        ));
        assert_eq!(
            h.queue
                .run_job(&JobId::new("missing"), &WorkerId::new("worker-1"))
                .await,
            Err(SchedulerError::JobNotFound(JobId::new("missing")))
        );

        let done = h
            .queue
            .run_job(&JobId::new("a"), &WorkerId::new("worker-1"))
            .await
            .unwrap();
        assert_eq!(done.status(), JobStatus::Finished);
        assert_eq!(done.result(), Some(&json!({ "from": "a" })));
    }

    #[tokio::test]
    async fn counts_and_subscription() {
        let h = harness().await;
        let mut rx = h.queue.subscribe();
        h.queue
            .add_job(
                Job::builder(JobName::new("a").unwrap())
                    .id(JobId::new("a"))
                    .priority(Priority::new(5))
                    .build(t0()),
            )
            .await
            .unwrap();
        h.queue.add_job(job("b", &["a"])).await.unwrap();

        let counts = h.queue.counts().await.unwrap();
        assert_eq!((counts.pending, counts.waiting), (1, 1));

        h.queue.process_jobs().await.unwrap();
        let counts = h.queue.counts().await.unwrap();
        assert_eq!(counts.finished, 2);
        assert!(counts.is_settled());

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind());
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::NewJob,
                EventKind::NewJob,
                EventKind::Completed,
                EventKind::Completed,
            ]
        );
    }

    /// Lists fine, but every write fails.
    struct ReadOnlyRepository(InMemoryJobRepository);

    #[async_trait]
    impl JobRepository for ReadOnlyRepository {
        async fn create(&self, job: Job) -> Result<Job, RepositoryError> {
            self.0.create(job).await
        }
        async fn save(&self, _job: Job) -> Result<Job, RepositoryError> {
            Err(RepositoryError::Storage("read-only".into()))
        }
        async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
            self.0.find_by_id(id).await
        }
        async fn list(&self) -> Result<Vec<Job>, RepositoryError> {
            self.0.list().await
        }
        async fn find_by_ids(&self, ids: &[JobId]) -> Result<Vec<Job>, RepositoryError> {
            self.0.find_by_ids(ids).await
        }
        async fn find_dependent_jobs(&self, id: &JobId) -> Result<Vec<Job>, RepositoryError> {
            self.0.find_dependent_jobs(id).await
        }
    }

    #[tokio::test]
    async fn save_failures_are_counted_and_emit_nothing() {
        let h = harness().await;
        let queue = JobQueue::new(
            Arc::new(ReadOnlyRepository(h.jobs.clone())),
            Arc::new(h.workers.clone()),
            Arc::new(FnExecutor::new(|_job: Job| async { Ok::<_, ExecutionFailure>(Value::Null) })),
            Arc::new(h.clock.clone()),
            QueueConfig::default().with_worker_id(WorkerId::new("worker-1")),
        );
        queue.add_job(job("a", &[])).await.unwrap();
        queue.add_job(job("b", &[])).await.unwrap();
        let events = record_kinds(&queue);

        let report = queue.process_jobs().await.unwrap();

        assert_eq!(report.examined, 2);
        assert_eq!(report.errored, 2);
        assert!(events.lock().unwrap().is_empty());
        assert_eq!(status(&h, "a").await, JobStatus::Pending);
    }

    #[tokio::test]
    async fn waiting_job_with_a_vanished_dependency_is_counted_as_errored() {
        let h = harness().await;
        h.queue.add_job(job("a", &[])).await.unwrap();
        // Stored directly, bypassing the dependency check of add_job.
        h.jobs.create(job("c", &["a", "ghost"])).await.unwrap();

        let report = h.queue.process_jobs().await.unwrap();

        assert_eq!(report.examined, 2);
        assert_eq!(report.completed, 1);
        assert_eq!(report.errored, 1);
        assert_eq!(status(&h, "c").await, JobStatus::Waiting);
    }

    /// Stores fine, but dependency lookups fail.
    struct LookupFailsRepository(InMemoryJobRepository);

    #[async_trait]
    impl JobRepository for LookupFailsRepository {
        async fn create(&self, job: Job) -> Result<Job, RepositoryError> {
            self.0.create(job).await
        }
        async fn save(&self, job: Job) -> Result<Job, RepositoryError> {
            self.0.save(job).await
        }
        async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
            self.0.find_by_id(id).await
        }
        async fn list(&self) -> Result<Vec<Job>, RepositoryError> {
            self.0.list().await
        }
        async fn find_by_ids(&self, _ids: &[JobId]) -> Result<Vec<Job>, RepositoryError> {
            Err(RepositoryError::Storage("lookup down".into()))
        }
        async fn find_dependent_jobs(&self, id: &JobId) -> Result<Vec<Job>, RepositoryError> {
            self.0.find_dependent_jobs(id).await
        }
    }

    #[tokio::test]
    async fn add_job_surfaces_dependency_lookup_failures() {
        let h = harness().await;
        let queue = JobQueue::new(
            Arc::new(LookupFailsRepository(h.jobs.clone())),
            Arc::new(h.workers.clone()),
            Arc::new(FnExecutor::new(|_job: Job| async { Ok::<_, ExecutionFailure>(Value::Null) })),
            Arc::new(h.clock.clone()),
            QueueConfig::default().with_worker_id(WorkerId::new("worker-1")),
        );
        queue.add_job(job("a", &[])).await.unwrap();
        let events = record_kinds(&queue);

        let err = queue.add_job(job("c", &["a"])).await.unwrap_err();

        assert_eq!(
            err,
            SchedulerError::DependencyResolution {
                job_id: JobId::new("c"),
                source: RepositoryError::Storage("lookup down".into()),
            }
        );
        assert!(h.jobs.find_by_id(&JobId::new("c")).await.unwrap().is_none());
        assert_eq!(h.jobs.len().await, 1);
        assert!(events.lock().unwrap().is_empty());
    }
}
