//! Domain model (ids, states, retry policy, jobs, workers, events, errors).

pub mod errors;
pub mod events;
pub mod ids;
pub mod job;
pub mod retry;
pub mod state;
pub mod worker;

pub use errors::{ErrorKind, JobError, RepositoryError, SchedulerError};
pub use events::{EventKind, QueueEvent};
pub use ids::{Id, IdMarker, JobId, WorkerId};
pub use job::{Job, JobBuilder, JobName, JsonMap, Priority};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use state::{JobStatus, can_transition, transition};
pub use worker::{Worker, WorkerStatus};
