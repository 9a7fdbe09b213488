//! App - use cases built on the ports.
//!
//! - **WorkerAssignment**: resolve a worker id to an available worker
//! - **ProcessJob**: one lifecycle step for one job
//! - **JobQueue**: enqueue, sweep, dependent cascade, events
//! - **Sweeper**: periodic sweeps in a background task

pub mod assign_worker;
pub mod config;
pub mod events;
pub mod process_job;
pub mod queue;
pub mod sweeper;

pub use self::assign_worker::WorkerAssignment;
pub use self::config::QueueConfig;
pub use self::events::EventBus;
pub use self::process_job::{ProcessError, ProcessJob};
pub use self::queue::{JobQueue, SweepReport};
pub use self::sweeper::Sweeper;
