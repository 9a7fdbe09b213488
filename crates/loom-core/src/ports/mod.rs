//! Ports - the contracts the engine needs from the outside world.
//!
//! Storage, execution, time and event delivery are all traits here; the
//! in-memory adapters in `impls` are enough to run the engine end to end.

pub mod clock;
pub mod event_sink;
pub mod executor;
pub mod job_repository;
pub mod worker_repository;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::EventSink;
pub use self::executor::{ExecutionFailure, TaskExecutor};
pub use self::job_repository::JobRepository;
pub use self::worker_repository::WorkerRepository;
