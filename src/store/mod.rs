//! The durable store: a single SQLite file holding the job queue and the
//! library catalog, behind three focused traits (`JobStore`, `LibraryStore`,
//! `MetaStore`) implemented by one [`SqliteStore`].

mod helpers;
mod models;
mod schema;
mod sqlite;

pub use models::{
    ExtractedTags, FileMove, Job, JobStatus, Library, LibraryFile, LibraryFolder,
    LibraryScan, LibraryScanStatus, QueueStats, TagDefinition,
};
pub use sqlite::{JobStore, LibraryStore, MetaStore, SqliteStore};

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, used throughout the store for
/// timestamps rather than SQLite's own `CURRENT_TIMESTAMP` so that callers
/// can inject a fixed clock in tests.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}
