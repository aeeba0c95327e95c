//! Worker loop: one scheduling thread per worker slot that drives the
//! worker pool coordinator. Not a process itself — N instances share the
//! same OS-process pool.
//!
//! Grounded on `download_manager::job_processor::QueueProcessor`: a
//! `tokio::time::interval` loop selecting against a `CancellationToken`,
//! same `run(&self, shutdown: CancellationToken)` shape.

use crate::broker::StateBroker;
use crate::queue::JobQueue;
use crate::store::{JobStore, MetaStore};
use crate::worker_pool::WorkerPoolCoordinator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Drives one worker slot's claim/submit/report cycle.
pub struct WorkerLoop<S: JobStore + MetaStore> {
    worker_id: String,
    queue: Arc<JobQueue<S>>,
    store: Arc<S>,
    pool: Arc<WorkerPoolCoordinator>,
    broker: Arc<StateBroker>,
    poll_interval: Duration,
    busy: Arc<AtomicBool>,
}

impl<S: JobStore + MetaStore> WorkerLoop<S> {
    pub fn new(
        worker_id: impl Into<String>,
        queue: Arc<JobQueue<S>>,
        store: Arc<S>,
        pool: Arc<WorkerPoolCoordinator>,
        broker: Arc<StateBroker>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            queue,
            store,
            pool,
            broker,
            poll_interval,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True while this loop is mid-job; consulted by the facade's
    /// dual-condition idle wait on shutdown.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(worker_id = %self.worker_id, "worker loop shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!(worker_id = %self.worker_id, error = %e, "worker loop iteration failed");
                    }
                }
            }
        }
    }

    async fn poll_once(&self) -> anyhow::Result<()> {
        if !self.store.worker_enabled()? {
            return Ok(());
        }

        let next_pending = {
            let (jobs, _) = self.queue.list(1, 0, Some(crate::store::JobStatus::Pending))?;
            jobs.into_iter().next()
        };

        let job = match next_pending {
            Some(job) => job,
            None => return Ok(()),
        };

        if !self.queue.start(job.id)? {
            // Lost the race to another worker loop; try again next tick.
            return Ok(());
        }

        self.busy.store(true, Ordering::SeqCst);
        self.broker.update_worker_state(
            &self.worker_id,
            serde_json::json!({ "state": "running", "path": job.path, "job_id": job.id }),
        );

        let started = std::time::Instant::now();
        let result = self.pool.submit(&job.path, job.force).await;
        let elapsed_sec = started.elapsed().as_secs_f64();

        match result {
            Ok(value) => {
                let results_json = serde_json::to_string(&value).ok();
                self.queue.mark_done(job.id, results_json)?;
                self.broker.update_job_state(job.id, serde_json::json!({ "id": job.id, "status": "done" }));
                self.store.update_avg_processing_time(elapsed_sec)?;
            }
            Err(e) => {
                let message = e.to_string();
                warn!(worker_id = %self.worker_id, job_id = job.id, error = %message, "job failed");
                self.queue.mark_error(job.id, &message)?;
                self.broker.update_job_state(
                    job.id,
                    serde_json::json!({ "id": job.id, "status": "error", "error": message }),
                );
            }
        }

        self.busy.store(false, Ordering::SeqCst);
        self.broker
            .update_worker_state(&self.worker_id, serde_json::json!({ "state": "idle" }));

        Ok(())
    }
}
