//! loom-core
//!
//! Job lifecycle and queue processing engine.
//!
//! # Modules
//! - **domain**: ids, the status table, retry policy, the `Job` aggregate, workers, events, errors
//! - **ports**: storage, executor, clock and event-sink contracts
//! - **app**: worker assignment, Process Job, `JobQueue`, the sweeper, configuration
//! - **impls**: in-memory adapters for development and tests
//! - **observability**: tracing setup and per-status counts
//!
//! # Example
//! ```ignore
//! let queue = JobQueue::new(jobs, workers, executor, Arc::new(SystemClock), QueueConfig::default());
//! queue.on(EventKind::Completed, |event| println!("done: {}", event.job().id()));
//! queue.add_job(Job::builder(JobName::new("resize")?).build(Utc::now())).await?;
//! let report = queue.process_jobs().await?;
//! ```

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

pub use app::{JobQueue, QueueConfig, SweepReport, Sweeper};
pub use domain::{
    BackoffStrategy, EventKind, Job, JobId, JobName, JobStatus, Priority, QueueEvent,
    RetryPolicy, SchedulerError, Worker, WorkerId, WorkerStatus,
};
