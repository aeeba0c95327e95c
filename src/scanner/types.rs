//! Plain data types shared across the scanner's phases.

use std::path::PathBuf;

/// One directory discovered under a scan target.
#[derive(Debug, Clone)]
pub struct DiscoveredFolder {
    pub abs_path: PathBuf,
    pub rel_path: String,
    pub mtime_ms: i64,
    pub audio_file_count: i64,
}

/// One audio file discovered inside a folder, before extraction.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub abs_path: PathBuf,
    pub normalized_path: String,
    pub size_bytes: i64,
    pub mtime_ms: i64,
}

/// Raw metadata pulled from a file by the external extractor, before
/// normalization into the canonical tag set.
#[derive(Debug, Clone, Default)]
pub struct RawMetadata {
    pub duration_ms: Option<i64>,
    pub title: Option<String>,
    pub artist_summary: Option<String>,
    /// `(key, values)` pairs as read from the file's native tag format.
    pub tags: Vec<(String, Vec<String>)>,
}

/// What the scanner injects for everything spec.md marks as a non-goal:
/// audio metadata reading and acoustic fingerprinting.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &std::path::Path) -> anyhow::Result<RawMetadata>;
    fn chromaprint(&self, path: &std::path::Path) -> anyhow::Result<String>;
}

#[derive(Debug, Default, Clone)]
pub struct ScanOutcome {
    pub folders_scanned: i64,
    pub folders_skipped: i64,
    pub files_added: i64,
    pub files_updated: i64,
    pub files_removed: i64,
    pub files_moved: i64,
    pub files_errored: i64,
}
