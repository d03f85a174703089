use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::jobs::{JobStore, StoreError};
use crate::pipeline::{JobOutcome, JobRunner};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Counts from one poll iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub found: usize,
    pub completed: usize,
    pub failed: usize,
    /// Jobs skipped because the store rejected a transition or write.
    pub errored: usize,
}

/// Discovers `created` jobs and processes them one at a time, oldest first.
pub struct Poller {
    runner: JobRunner,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Poller {
    pub fn new(runner: JobRunner, interval: Duration, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            runner,
            interval,
            shutdown,
        }
    }

    fn store(&self) -> &JobStore {
        self.runner.store()
    }

    /// One discovery pass. A failure to list jobs aborts the pass; a store
    /// failure on one job is logged and the next job is tried.
    pub async fn run_once(&self) -> Result<PollSummary, StoreError> {
        let pending = self.store().list_pending_oldest_first()?;
        let mut summary = PollSummary {
            found: pending.len(),
            ..PollSummary::default()
        };

        if pending.is_empty() {
            debug!("No pending uploads");
            return Ok(summary);
        }
        info!(count = pending.len(), "Found pending uploads");

        for job in pending {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested, leaving remaining uploads for the next run");
                break;
            }

            let job_id = job.id.clone();
            match self.runner.process(job).await {
                Ok(JobOutcome::Completed { .. }) => summary.completed += 1,
                Ok(JobOutcome::Failed { .. }) => summary.failed += 1,
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Could not update job state");
                    summary.errored += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Polls until the shutdown flag is set.
    pub async fn run(&self) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            "Explainer service started"
        );

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.run_once().await {
                Ok(summary) if summary.found > 0 => info!(
                    completed = summary.completed,
                    failed = summary.failed,
                    errored = summary.errored,
                    "Poll iteration finished"
                ),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Error in poll loop, retrying after interval"),
            }

            self.sleep_interruptibly().await;
        }

        info!("Explainer service stopped");
    }

    async fn sleep_interruptibly(&self) {
        let deadline = tokio::time::Instant::now() + self.interval;
        while !self.shutdown.load(Ordering::Relaxed) {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(SHUTDOWN_CHECK_INTERVAL.min(deadline - now)).await;
        }
    }
}
