//! Data models for the durable store.

use serde::{Deserialize, Serialize};

/// Status of a queued tagging job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "done" => Some(JobStatus::Done),
            "error" => Some(JobStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

/// One requested tagging of one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub path: String,
    pub force: bool,
    pub status: JobStatus,
    pub created_at_ms: i64,
    pub started_at_ms: Option<i64>,
    pub finished_at_ms: Option<i64>,
    pub error_message: Option<String>,
    pub results_json: Option<String>,
}

/// Aggregate queue counts, grouped by status in one query.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub running: i64,
    pub done: i64,
    pub error: i64,
}

impl QueueStats {
    pub fn depth(&self) -> i64 {
        self.pending + self.running
    }
}

/// A root directory containing audio files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryScanStatus {
    Idle,
    Scanning,
    Complete,
    Error,
}

impl LibraryScanStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            LibraryScanStatus::Idle => "idle",
            LibraryScanStatus::Scanning => "scanning",
            LibraryScanStatus::Complete => "complete",
            LibraryScanStatus::Error => "error",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "scanning" => LibraryScanStatus::Scanning,
            "complete" => LibraryScanStatus::Complete,
            "error" => LibraryScanStatus::Error,
            _ => LibraryScanStatus::Idle,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub id: i64,
    pub name: String,
    pub root_path: String,
    pub is_default: bool,
    pub scan_status: LibraryScanStatus,
    pub scan_error: Option<String>,
}

/// One audio file known to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryFile {
    pub id: i64,
    pub library_id: i64,
    pub abs_path: String,
    pub normalized_path: String,
    pub size_bytes: i64,
    pub mtime_ms: i64,
    pub duration_ms: Option<i64>,
    pub title: Option<String>,
    pub artist_summary: Option<String>,
    pub needs_tagging: bool,
    pub tagged: bool,
    pub scan_id: String,
    pub chromaprint: Option<String>,
    pub version_tag: Option<String>,
}

/// Directory mtime/file-count cache used to skip unchanged folders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryFolder {
    pub library_id: i64,
    pub rel_path: String,
    pub mtime_ms: i64,
    pub audio_file_count: i64,
}

/// A tag definition: a deduplicated `(key, value-as-JSON-array, is_nomarr)` triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagDefinition {
    pub id: i64,
    pub key: String,
    pub value_json: String,
    pub is_nomarr: bool,
}

/// A scan attempt record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryScan {
    pub id: String,
    pub library_id: i64,
    pub status: LibraryScanStatus,
    pub started_at_ms: i64,
    pub finished_at_ms: Option<i64>,
    pub folders_scanned: i64,
    pub folders_skipped: i64,
    pub files_added: i64,
    pub files_updated: i64,
    pub files_removed: i64,
    pub files_moved: i64,
    pub files_errored: i64,
    pub error_message: Option<String>,
}

/// A single file renamed/moved during scan-time move detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMove {
    pub file_id: i64,
    pub old_path: String,
    pub new_path: String,
    pub new_abs_path: String,
    pub new_size: i64,
    pub new_mtime_ms: i64,
    pub new_duration_ms: Option<i64>,
}

/// A normalized tag set extracted for one file, ready to be seeded as edges.
#[derive(Debug, Clone, Default)]
pub struct ExtractedTags {
    pub values: Vec<(String, serde_json::Value, bool)>,
}
