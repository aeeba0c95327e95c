//! TOML configuration file shape.
//!
//! Every field is optional; `AppConfig::resolve` layers these values on
//! top of CLI defaults, TOML winning when present.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub db_dir: Option<String>,
    pub library_root: Option<String>,
    pub models_dir: Option<String>,
    pub pool_size: Option<usize>,
    pub poll_interval_sec: Option<u64>,
    pub job_timeout_sec: Option<u64>,
    pub drain_timeout_sec: Option<u64>,
    pub broker_buffer_size: Option<usize>,
    pub predictor_idle_timeout_sec: Option<u64>,
    pub predictor_auto_evict: Option<bool>,

    pub tagging: Option<TaggingConfig>,
}

/// File-format tag normalization settings (Design Notes: file-format tag
/// normalization, `MP4_FREEFORM_BLOCKLIST` resolved as configuration).
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct TaggingConfig {
    pub namespace: Option<String>,
    pub version_tag_key: Option<String>,
    pub tagger_version: Option<String>,
    pub freeform_blocklist: Option<Vec<String>>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
