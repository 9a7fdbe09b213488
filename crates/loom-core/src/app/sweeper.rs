//! Sweeper - runs `process_jobs()` on an interval in a background task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::queue::JobQueue;

/// Handle to the sweep task.
/// - `request_shutdown()` stops it after the sweep in progress, if any
/// - `shutdown_and_join()` also waits for it to exit
pub struct Sweeper {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn a sweep loop using the queue's configured interval.
    pub fn spawn(queue: Arc<JobQueue>) -> Self {
        let interval = queue.config().sweep_interval();
        Self::spawn_with_interval(queue, interval)
    }

    pub fn spawn_with_interval(queue: Arc<JobQueue>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            sweep_loop(queue, interval, &mut shutdown_rx).await;
        });
        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

async fn sweep_loop(
    queue: Arc<JobQueue>,
    interval: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    let name = queue.config().name.clone();
    let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
    info!(queue = %name, interval_ms, "sweeper started");

    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    // A slow sweep delays the next one instead of triggering a burst.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        match queue.process_jobs().await {
            Ok(report) if report.changed() > 0 || report.errored > 0 => {
                info!(queue = %name, ?report, "sweep");
            }
            Ok(report) => debug!(queue = %name, ?report, "sweep"),
            Err(err) => error!(queue = %name, error = %err, kind = ?err.kind(), "sweep failed"),
        }
    }

    info!(queue = %name, "sweeper stopped");
}
