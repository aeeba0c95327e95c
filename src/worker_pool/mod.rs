//! Worker pool coordinator: owns a fixed-size OS-process pool (not a
//! thread pool — native ML libraries used by the worker can't be safely
//! reinitialized in-process, and a process boundary survives crashes).
//!
//! Grounded on `nomarr/interfaces/api/coordinator.py`
//! (`ProcessingCoordinator`), translated to the systems idiom: each child
//! is the `nomad-worker` binary (A5), fed one job at a time as a JSON
//! line on stdin, replying one JSON line on stdout.

use crate::broker::StateBroker;
use crate::error::{EngineError, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

struct Worker {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

struct Pool {
    workers: Vec<Arc<AsyncMutex<Worker>>>,
    next: AtomicUsize,
}

enum PoolState {
    Absent,
    Running(Pool),
    ShutDown,
}

/// Owns the child process pool. `Submit` is the blocking call described
/// in spec §4.4; `state` transitions `absent -> running -> broken ->
/// running (rebuilt)` or `running -> shutdown`.
pub struct WorkerPoolCoordinator {
    size: usize,
    worker_bin: PathBuf,
    models_dir: PathBuf,
    timeout_sec: u64,
    broker: Option<Arc<StateBroker>>,
    state: AsyncMutex<PoolState>,
}

impl WorkerPoolCoordinator {
    pub fn new(size: usize, worker_bin: PathBuf, models_dir: PathBuf, timeout_sec: u64) -> Self {
        Self {
            size,
            worker_bin,
            models_dir,
            timeout_sec,
            broker: None,
            state: AsyncMutex::new(PoolState::Absent),
        }
    }

    pub fn with_broker(mut self, broker: Arc<StateBroker>) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Creates the pool. No-op if already running.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if matches!(*state, PoolState::Running(_)) {
            return Ok(());
        }
        if matches!(*state, PoolState::ShutDown) {
            return Err(EngineError::Other(anyhow::anyhow!(
                "cannot start a worker pool after shutdown"
            )));
        }
        *state = PoolState::Running(self.spawn_pool().await?);
        info!(size = self.size, "worker pool started");
        Ok(())
    }

    async fn spawn_pool(&self) -> Result<Pool> {
        let mut workers = Vec::with_capacity(self.size);
        for idx in 0..self.size {
            workers.push(Arc::new(AsyncMutex::new(self.spawn_one(idx).await?)));
        }
        Ok(Pool {
            workers,
            next: AtomicUsize::new(0),
        })
    }

    async fn spawn_one(&self, idx: usize) -> Result<Worker> {
        let mut child = Command::new(&self.worker_bin)
            .arg("--models-dir")
            .arg(&self.models_dir)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .spawn()
            .map_err(|e| EngineError::WorkerCrash(format!("failed to spawn worker {}: {}", idx, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::WorkerCrash("worker has no stdin".to_string()))?;
        let stdout = BufReader::new(
            child
                .stdout
                .take()
                .ok_or_else(|| EngineError::WorkerCrash("worker has no stdout".to_string()))?,
        );

        Ok(Worker { child, stdin, stdout })
    }

    /// Submit a job and block for its result, subject to the per-job
    /// timeout. On a broken pool, rebuilds once and retries exactly once.
    pub async fn submit(&self, path: &str, force: bool) -> Result<Value> {
        {
            let state = self.state.lock().await;
            if matches!(*state, PoolState::ShutDown) {
                return Err(EngineError::Other(anyhow::anyhow!("pool is shut down")));
            }
        }

        match self.submit_once(path, force).await {
            Ok(v) => Ok(v),
            Err(e) if is_broken_pool_error(&e) => {
                warn!(path, error = %e, "worker pool broken, rebuilding and retrying once");
                self.rebuild_pool().await?;
                self.submit_once(path, force).await.map_err(|retry_err| {
                    EngineError::WorkerCrash(format!("Worker crash (retry failed): {}", retry_err))
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn submit_once(&self, path: &str, force: bool) -> Result<Value> {
        let worker = {
            let mut state = self.state.lock().await;
            match &mut *state {
                PoolState::Running(pool) => {
                    let idx = pool.next.fetch_add(1, Ordering::Relaxed) % pool.workers.len();
                    pool.workers[idx].clone()
                }
                PoolState::Absent => {
                    drop(state);
                    self.start().await?;
                    return Box::pin(self.submit_once(path, force)).await;
                }
                PoolState::ShutDown => {
                    return Err(EngineError::Other(anyhow::anyhow!("pool is shut down")));
                }
            }
        };

        let request = serde_json::json!({ "path": path, "force": force });
        let line = serde_json::to_string(&request).map_err(anyhow::Error::from)?;

        let call = async {
            let mut worker = worker.lock().await;
            worker.stdin.write_all(line.as_bytes()).await?;
            worker.stdin.write_all(b"\n").await?;
            worker.stdin.flush().await?;

            let mut response = String::new();
            let bytes_read = worker.stdout.read_line(&mut response).await?;
            if bytes_read == 0 {
                anyhow::bail!("worker closed stdout (crashed)");
            }
            Ok::<String, anyhow::Error>(response)
        };

        let response = match tokio::time::timeout(std::time::Duration::from_secs(self.timeout_sec), call).await {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => return Err(EngineError::WorkerCrash(e.to_string())),
            Err(_) => {
                return Err(EngineError::Timeout(self.timeout_sec));
            }
        };

        let parsed: Value = serde_json::from_str(response.trim()).map_err(anyhow::Error::from)?;
        match parsed.get("status").and_then(Value::as_str) {
            Some("ok") => Ok(parsed.get("result").cloned().unwrap_or(Value::Null)),
            Some("error") => {
                let message = parsed
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown worker error")
                    .to_string();
                Err(EngineError::ExtractionFailure {
                    path: path.to_string(),
                    message,
                })
            }
            _ => Err(EngineError::Other(anyhow::anyhow!(
                "malformed worker response: {}",
                response
            ))),
        }
    }

    /// Cancel the broken pool best-effort, discard it, spawn a fresh one
    /// of the same size.
    pub async fn rebuild_pool(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if let PoolState::Running(pool) = &*state {
            for worker in &pool.workers {
                let mut worker = worker.lock().await;
                let _ = worker.child.start_kill();
            }
        }
        *state = PoolState::Running(self.spawn_pool().await?);
        info!("worker pool rebuilt");
        Ok(())
    }

    pub fn publish_event(&self, topic: &str, payload: Value) {
        if let Some(broker) = &self.broker {
            if let Some(worker_id) = topic.strip_prefix("worker:").and_then(|s| s.strip_suffix(":status")) {
                broker.update_worker_state(worker_id, payload);
            } else {
                broker.update_system_health("info", None);
                let _ = payload;
            }
        }
    }

    /// Marks shutdown, then gracefully shuts down the pool: waits for
    /// children to exit rather than killing them.
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if let PoolState::Running(pool) = &mut *state {
            for worker in &pool.workers {
                let mut worker = worker.lock().await;
                drop(worker.stdin.shutdown().await);
                if let Err(e) = worker.child.wait().await {
                    error!(error = %e, "error waiting for worker to exit");
                }
            }
        }
        *state = PoolState::ShutDown;
        info!("worker pool stopped");
        Ok(())
    }
}

fn is_broken_pool_error(err: &EngineError) -> bool {
    match err {
        EngineError::WorkerCrash(_) => true,
        EngineError::Other(e) => {
            let msg = e.to_string();
            msg.contains("abruptly") || msg.contains("process pool") || msg.contains("crashed")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_broken_pool_error_detects_worker_crash_variant() {
        assert!(is_broken_pool_error(&EngineError::WorkerCrash("oops".into())));
    }

    #[test]
    fn test_is_broken_pool_error_substring_fallback() {
        let err = EngineError::Other(anyhow::anyhow!("pool died abruptly"));
        assert!(is_broken_pool_error(&err));
        let benign = EngineError::Other(anyhow::anyhow!("disk full"));
        assert!(!is_broken_pool_error(&benign));
    }

    #[test]
    fn test_is_broken_pool_error_does_not_flag_unrelated_variants() {
        assert!(!is_broken_pool_error(&EngineError::NotFound));
        assert!(!is_broken_pool_error(&EngineError::Timeout(5)));
    }
}
