//! Job queue: a thin transactional API over [`crate::store::JobStore`].
//! All updates commit eagerly; see spec §4.5 for the operation contract.

use crate::error::{EngineError, Result};
use crate::store::{now_ms, Job, JobStatus, JobStore, QueueStats};
use std::sync::Arc;

pub struct JobQueue<S: JobStore> {
    store: Arc<S>,
}

impl<S: JobStore> JobQueue<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Inserts a new `pending` job. The same path may be enqueued more
    /// than once; each call creates a distinct job.
    pub fn add(&self, path: &str, force: bool) -> Result<i64> {
        self.store.add(path, force).map_err(EngineError::Other)
    }

    pub fn get(&self, id: i64) -> Result<Option<Job>> {
        self.store.get(id).map_err(EngineError::Other)
    }

    /// Total is a separate COUNT so pagination stays honest under concurrent writes.
    pub fn list(&self, limit: usize, offset: usize, status: Option<JobStatus>) -> Result<(Vec<Job>, usize)> {
        self.store.list(limit, offset, status).map_err(EngineError::Other)
    }

    pub fn depth(&self) -> Result<i64> {
        Ok(self.store.queue_stats().map_err(EngineError::Other)?.depth())
    }

    pub fn queue_stats(&self) -> Result<QueueStats> {
        self.store.queue_stats().map_err(EngineError::Other)
    }

    /// The claim primitive: transitions `pending -> running`, setting
    /// `started_at`. Exactly one caller wins per job id, guaranteed by
    /// the store's row-level update semantics (`WHERE status = 'pending'`).
    pub fn start(&self, id: i64) -> Result<bool> {
        self.store.start(id, now_ms()).map_err(EngineError::Other)
    }

    pub fn mark_done(&self, id: i64, results_json: Option<String>) -> Result<()> {
        self.store.mark_done(id, results_json, now_ms()).map_err(EngineError::Other)
    }

    pub fn mark_error(&self, id: i64, message: &str) -> Result<()> {
        self.store.mark_error(id, message, now_ms()).map_err(EngineError::Other)
    }

    /// Deletes jobs in the given terminal status set. Rejects `running`
    /// and any unknown status name (callers pass already-parsed
    /// [`JobStatus`] values, so "unknown" can only mean non-terminal here).
    pub fn flush(&self, statuses: &[JobStatus]) -> Result<usize> {
        if statuses.iter().any(|s| !s.is_terminal()) {
            return Err(EngineError::InvalidArgument(
                "flush only accepts terminal statuses (done, error)".to_string(),
            ));
        }
        self.store.flush(statuses).map_err(EngineError::Other)
    }

    /// Used on startup and by admin reset to recover crash-orphans.
    pub fn reset_running_to_pending(&self) -> Result<usize> {
        self.store.reset_running_to_pending().map_err(EngineError::Other)
    }

    pub fn reset_errors_to_pending(&self) -> Result<usize> {
        self.store.reset_errors_to_pending().map_err(EngineError::Other)
    }

    pub fn cleanup_old(&self, max_age_hours: u64) -> Result<usize> {
        self.store.cleanup_old(max_age_hours, now_ms()).map_err(EngineError::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn queue() -> JobQueue<SqliteStore> {
        JobQueue::new(Arc::new(SqliteStore::in_memory().unwrap()))
    }

    #[test]
    fn test_add_creates_distinct_jobs_for_same_path() {
        let q = queue();
        let id1 = q.add("/a.mp3", false).unwrap();
        let id2 = q.add("/a.mp3", false).unwrap();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_start_is_claim_exactly_once() {
        let q = queue();
        let id = q.add("/a.mp3", false).unwrap();
        assert!(q.start(id).unwrap());
        assert!(!q.start(id).unwrap());
    }

    #[test]
    fn test_flush_rejects_non_terminal_status() {
        let q = queue();
        let result = q.flush(&[JobStatus::Running]);
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_list_reports_honest_total() {
        let q = queue();
        q.add("/a.mp3", false).unwrap();
        q.add("/b.mp3", false).unwrap();
        let (jobs, total) = q.list(1, 0, None).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(total, 2);
    }
}
