//! Orchestration facade: owns startup/shutdown of every other component
//! and exposes the engine's language-neutral operation set (spec §4.8).
//!
//! Grounded on `nomarr/services/worker.py` (`WorkerService.disable()` /
//! `wait_until_idle()`), translated to async: a poll loop against a
//! deadline checking both "any worker loop busy" and "any job row still
//! running" (dual check guards against a crash mid-job leaving the row
//! stuck at `running` with no worker actually holding it).

use crate::broker::StateBroker;
use crate::config::AppConfig;
use crate::error::{EngineError, Result};
use crate::queue::JobQueue;
use crate::scanner::LibraryScanner;
use crate::store::{Job, JobStatus, JobStore, Library, LibraryStore, MetaStore, QueueStats};
use crate::worker_loop::WorkerLoop;
use crate::worker_pool::WorkerPoolCoordinator;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct EnqueueResult {
    pub job_ids: Vec<i64>,
    pub files_queued: usize,
    pub queue_depth: i64,
}

pub struct StatusSummary {
    pub pending: i64,
    pub running: i64,
    pub done: i64,
    pub error: i64,
}

/// Owns the whole component graph for one running engine instance.
pub struct Engine<S: JobStore + LibraryStore + MetaStore + 'static> {
    config: AppConfig,
    store: Arc<S>,
    queue: Arc<JobQueue<S>>,
    broker: Arc<StateBroker>,
    pool: Arc<WorkerPoolCoordinator>,
    scanner: Arc<LibraryScanner<S>>,
    worker_loops: Vec<Arc<WorkerLoop<S>>>,
    shutdown: CancellationToken,
    loop_handles: std::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl<S: JobStore + LibraryStore + MetaStore + 'static> Engine<S> {
    /// Startup order per spec §4.8: store is assumed already open by the
    /// caller (C1); crash-orphans are reset, then C3, C4, N×C6 start in
    /// order, and the engine becomes ready.
    pub async fn start(
        config: AppConfig,
        store: Arc<S>,
        scanner: Arc<LibraryScanner<S>>,
        worker_bin: std::path::PathBuf,
    ) -> Result<Self> {
        let reset = store.reset_running_to_pending().map_err(EngineError::Other)?;
        if reset > 0 {
            warn!(reset, "recovered crash-orphaned jobs on startup");
        }

        let queue = Arc::new(JobQueue::new(store.clone()));
        let broker = Arc::new(StateBroker::new(config.broker_buffer_size));

        let pool = Arc::new(
            WorkerPoolCoordinator::new(config.pool_size, worker_bin, config.models_dir.clone(), config.job_timeout_sec)
                .with_broker(broker.clone()),
        );
        pool.start().await?;

        let shutdown = CancellationToken::new();
        let mut worker_loops = Vec::with_capacity(config.pool_size);
        let mut loop_handles = Vec::with_capacity(config.pool_size);

        for idx in 0..config.pool_size {
            let worker_loop = Arc::new(WorkerLoop::new(
                idx.to_string(),
                queue.clone(),
                store.clone(),
                pool.clone(),
                broker.clone(),
                Duration::from_secs(config.poll_interval_sec),
            ));
            let handle = {
                let worker_loop = worker_loop.clone();
                let token = shutdown.clone();
                tokio::spawn(async move { worker_loop.run(token).await })
            };
            worker_loops.push(worker_loop);
            loop_handles.push(handle);
        }

        info!(pool_size = config.pool_size, "engine ready");

        Ok(Self {
            config,
            store,
            queue,
            broker,
            pool,
            scanner,
            worker_loops,
            shutdown,
            loop_handles: std::sync::Mutex::new(loop_handles),
        })
    }

    pub fn broker(&self) -> Arc<StateBroker> {
        self.broker.clone()
    }

    /// Expands directories to audio files when `recursive`, rejects
    /// non-audio inputs.
    pub fn enqueue(&self, paths: &[String], force: bool, recursive: bool) -> Result<EnqueueResult> {
        let mut files = Vec::new();
        for raw in paths {
            let path = Path::new(raw);
            if recursive && path.is_dir() {
                for entry in walkdir::WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
                    if entry.file_type().is_file() && crate::scanner::is_audio_file(entry.path()) {
                        files.push(entry.path().to_string_lossy().to_string());
                    }
                }
            } else if crate::scanner::is_audio_file(path) {
                files.push(raw.clone());
            } else {
                return Err(EngineError::InvalidArgument(format!("not an audio file: {}", raw)));
            }
        }

        let mut job_ids = Vec::with_capacity(files.len());
        for file in &files {
            let id = self.queue.add(file, force)?;
            job_ids.push(id);
            self.broker
                .update_job_state(id, serde_json::json!({ "id": id, "status": "pending", "path": file }));
        }

        let depth = self.queue.depth()?;
        Ok(EnqueueResult {
            files_queued: files.len(),
            job_ids,
            queue_depth: depth,
        })
    }

    pub fn get_status(&self) -> Result<StatusSummary> {
        let QueueStats { pending, running, done, error } = self.queue.queue_stats()?;
        Ok(StatusSummary { pending, running, done, error })
    }

    pub fn get_job(&self, id: i64) -> Result<Option<Job>> {
        self.queue.get(id)
    }

    pub fn list_jobs(&self, limit: usize, offset: usize, status: Option<JobStatus>) -> Result<(Vec<Job>, usize)> {
        self.queue.list(limit, offset, status)
    }

    /// Rejects removing `running` jobs unless the caller paused workers first.
    pub fn remove_jobs(&self, statuses: &[JobStatus]) -> Result<usize> {
        if statuses.iter().any(|s| *s == JobStatus::Running) && self.store.worker_enabled().map_err(EngineError::Other)? {
            return Err(EngineError::Conflict(
                "cannot remove running jobs while workers are active; call Pause() first".to_string(),
            ));
        }
        self.queue.flush(statuses)
    }

    pub fn reset_jobs(&self, stuck: bool, errors: bool) -> Result<usize> {
        let mut reset = 0;
        if stuck {
            reset += self.queue.reset_running_to_pending()?;
        }
        if errors {
            reset += self.queue.reset_errors_to_pending()?;
        }
        Ok(reset)
    }

    pub fn cleanup_old(&self, max_age_hours: u64) -> Result<usize> {
        self.queue.cleanup_old(max_age_hours)
    }

    pub fn subscribe(&self, patterns: Vec<String>) -> crate::broker::Subscription {
        self.broker.subscribe(patterns)
    }

    pub fn start_scan(&self, library: &Library, full: bool) -> Result<crate::store::LibraryScan> {
        if full {
            self.scanner.scan_full(library)
        } else {
            self.scanner.scan_incremental(library)
        }
    }

    pub fn pause(&self) -> Result<()> {
        self.store.set_worker_enabled(false).map_err(EngineError::Other)
    }

    pub fn resume(&self) -> Result<()> {
        self.store.set_worker_enabled(true).map_err(EngineError::Other)
    }

    /// Shutdown order per spec §4.8: disable `worker_enabled`, wait for
    /// idle (dual condition), stop worker loops, stop the pool, drop the
    /// broker's subscribers.
    pub async fn shutdown(&self) -> Result<()> {
        self.store.set_worker_enabled(false).map_err(EngineError::Other)?;
        self.wait_until_idle(Duration::from_secs(self.config.drain_timeout_sec)).await;

        self.shutdown.cancel();
        let handles: Vec<_> = self.loop_handles.lock().unwrap().drain(..).collect();
        for handle in handles {
            if tokio::time::timeout(Duration::from_secs(10), handle).await.is_err() {
                warn!("worker loop did not join within 10s of cancellation");
            }
        }

        self.pool.stop().await?;
        info!("engine shut down");
        Ok(())
    }

    async fn wait_until_idle(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let any_busy = self.worker_loops.iter().any(|w| w.is_busy());
            let any_running_row = self
                .queue
                .queue_stats()
                .map(|s| s.running > 0)
                .unwrap_or(false);

            if !any_busy && !any_running_row {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("drain timeout elapsed with jobs still running; leaving them for next startup's reset");
                return;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }
}
