//! loom demo: a small dependency graph driven by periodic sweeps against
//! in-memory storage, with an executor that fails a few times on purpose.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use serde_json::{Value, json};
use tracing::info;

use loom_core::domain::{
    EventKind, Job, JobName, JsonMap, Priority, QueueEvent, RetryPolicy, Worker, WorkerId,
    WorkerStatus,
};
use loom_core::impls::{InMemoryJobRepository, InMemoryWorkerRepository};
use loom_core::observability::{self, LogFormat, TracingEventSink};
use loom_core::ports::{ExecutionFailure, SystemClock, TaskExecutor};
use loom_core::{JobQueue, QueueConfig};

/// Run a demo job graph through the loom queue.
#[derive(Parser, Debug)]
#[command(name = "loom", version, about)]
struct Cli {
    /// Pause between sweeps, in milliseconds.
    #[arg(long, env = "LOOM_SWEEP_INTERVAL_MS", default_value_t = 200)]
    sweep_interval_ms: u64,

    /// Worker slot the sweep runs on.
    #[arg(long, env = "LOOM_WORKER_ID", default_value = "worker-1")]
    worker_id: String,

    /// Log output: plain or json.
    #[arg(long, env = "LOOM_LOG_FORMAT", default_value_t = LogFormat::Plain)]
    log_format: LogFormat,

    /// How many executions fail before the executor starts succeeding.
    #[arg(long, default_value_t = 2)]
    failures: u32,

    /// Give up after this many sweeps.
    #[arg(long, default_value_t = 100)]
    max_sweeps: u32,
}

/// Fails the first `n` executions, then echoes the payload.
struct FlakyExecutor {
    remaining_failures: AtomicU32,
}

impl FlakyExecutor {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl TaskExecutor for FlakyExecutor {
    async fn execute_task(&self, job: &Job) -> Result<Value, ExecutionFailure> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(ExecutionFailure::new(format!(
                "intentional failure (left={left})"
            )));
        }

        Ok(json!({
            "job": job.name().as_str(),
            "inputs": job.payload().len(),
        }))
    }
}

fn payload(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    observability::init(cli.log_format);

    let worker_id = WorkerId::new(cli.worker_id.clone());
    let workers = InMemoryWorkerRepository::new();
    workers
        .upsert(Worker::new(
            worker_id.clone(),
            "demo",
            WorkerStatus::Available,
            Utc::now(),
        ))
        .await;

    let jobs = InMemoryJobRepository::new();
    let config = QueueConfig::default()
        .with_name("demo")
        .with_worker_id(worker_id)
        .with_sweep_interval(Duration::from_millis(cli.sweep_interval_ms));
    let queue = JobQueue::new(
        Arc::new(jobs),
        Arc::new(workers),
        Arc::new(FlakyExecutor::new(cli.failures)),
        Arc::new(SystemClock),
        config,
    );
    queue.events().attach(Arc::new(TracingEventSink));
    queue.on(EventKind::Retrying, |event| {
        if let QueueEvent::Retrying { job, attempt, error } = event {
            println!("retrying {} (attempt {attempt}): {error}", job.name());
        }
    });
    queue.on(EventKind::Completed, |event| {
        let job = event.job();
        let result = job.result().cloned().unwrap_or(Value::Null);
        println!("completed {} -> {result}", job.name());
    });
    queue.on(EventKind::Failed, |event| {
        println!("failed {}", event.job().name());
    });

    let retry = RetryPolicy::linear(5, Duration::from_millis(100))?
        .with_max_delay(Duration::from_secs(1));
    let now = Utc::now();

    // extract -> (clean, enrich) -> report
    let extract = queue
        .add_job(
            Job::builder(JobName::new("extract")?)
                .priority(Priority::new(10))
                .retry_policy(retry.clone())
                .payload(payload(json!({ "source": "orders.csv" })))
                .build(now),
        )
        .await?;
    let clean = queue
        .add_job(
            Job::builder(JobName::new("clean")?)
                .retry_policy(retry.clone())
                .dependencies([extract.id().clone()])
                .build(now),
        )
        .await?;
    let enrich = queue
        .add_job(
            Job::builder(JobName::new("enrich")?)
                .retry_policy(retry.clone())
                .dependencies([extract.id().clone()])
                .build(now),
        )
        .await?;
    queue
        .add_job(
            Job::builder(JobName::new("report")?)
                .retry_policy(retry)
                .dependencies([clean.id().clone(), enrich.id().clone()])
                .build(now),
        )
        .await?;

    let interval = queue.config().sweep_interval();
    for sweep in 1..=cli.max_sweeps {
        let report = queue.process_jobs().await?;
        info!(sweep, ?report, "sweep");

        let counts = queue.counts().await?;
        if counts.is_settled() {
            println!("{}", serde_json::to_string_pretty(&counts)?);
            return Ok(());
        }
        tokio::time::sleep(interval).await;
    }

    anyhow::bail!("jobs still pending after {} sweeps", cli.max_sweeps)
}
