//! Impls - in-memory adapters for development and tests.
//!
//! Durable storage belongs in separate crates implementing the same ports.

pub mod executor;
pub mod inmem_job_repository;
pub mod inmem_worker_repository;

pub use self::executor::FnExecutor;
pub use self::inmem_job_repository::InMemoryJobRepository;
pub use self::inmem_worker_repository::InMemoryWorkerRepository;
