mod file_config;

pub use file_config::{FileConfig, TaggingConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// Mirrors the flags accepted by `nomad-engine serve`; TOML overrides these.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub library_root: Option<PathBuf>,
    pub models_dir: Option<PathBuf>,
    pub pool_size: Option<usize>,
    pub poll_interval_sec: Option<u64>,
    pub job_timeout_sec: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub library_root: PathBuf,
    pub models_dir: PathBuf,
    pub pool_size: usize,
    pub poll_interval_sec: u64,
    pub job_timeout_sec: u64,
    pub drain_timeout_sec: u64,
    pub broker_buffer_size: usize,
    pub predictor: PredictorSettings,
    pub tagging: TaggingSettings,
}

#[derive(Debug, Clone)]
pub struct PredictorSettings {
    pub idle_timeout_sec: u64,
    pub auto_evict: bool,
}

impl Default for PredictorSettings {
    fn default() -> Self {
        Self {
            idle_timeout_sec: 600,
            auto_evict: true,
        }
    }
}

/// File-format tag normalization settings (Design Notes: canonical tag
/// set, `MP4_FREEFORM_BLOCKLIST` resolved as configuration).
#[derive(Debug, Clone)]
pub struct TaggingSettings {
    pub namespace: String,
    pub version_tag_key: String,
    pub tagger_version: String,
    pub freeform_blocklist: Vec<String>,
}

impl Default for TaggingSettings {
    fn default() -> Self {
        Self {
            namespace: "nom".to_string(),
            version_tag_key: "nom_version".to_string(),
            tagger_version: "1".to_string(),
            freeform_blocklist: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let library_root = file
            .library_root
            .map(PathBuf::from)
            .or_else(|| cli.library_root.clone())
            .ok_or_else(|| anyhow::anyhow!("library_root must be specified"))?;

        let models_dir = file
            .models_dir
            .map(PathBuf::from)
            .or_else(|| cli.models_dir.clone())
            .unwrap_or_else(|| db_dir.join("models"));

        let pool_size = file.pool_size.or(cli.pool_size).unwrap_or(1);
        let poll_interval_sec = file.poll_interval_sec.or(cli.poll_interval_sec).unwrap_or(2);
        let job_timeout_sec = file.job_timeout_sec.or(cli.job_timeout_sec).unwrap_or(3600);
        let drain_timeout_sec = 60;
        let broker_buffer_size = file.broker_buffer_size.unwrap_or(1000);

        let predictor_defaults = PredictorSettings::default();
        let predictor = PredictorSettings {
            idle_timeout_sec: file
                .predictor_idle_timeout_sec
                .unwrap_or(predictor_defaults.idle_timeout_sec),
            auto_evict: file
                .predictor_auto_evict
                .unwrap_or(predictor_defaults.auto_evict),
        };

        let tagging_defaults = TaggingSettings::default();
        let tagging_file = file.tagging.unwrap_or_default();
        let tagging = TaggingSettings {
            namespace: tagging_file.namespace.unwrap_or(tagging_defaults.namespace),
            version_tag_key: tagging_file
                .version_tag_key
                .unwrap_or(tagging_defaults.version_tag_key),
            tagger_version: tagging_file
                .tagger_version
                .unwrap_or(tagging_defaults.tagger_version),
            freeform_blocklist: tagging_file
                .freeform_blocklist
                .unwrap_or(tagging_defaults.freeform_blocklist),
        };

        Ok(Self {
            db_dir,
            library_root,
            models_dir,
            pool_size,
            poll_interval_sec,
            job_timeout_sec,
            drain_timeout_sec,
            broker_buffer_size,
            predictor,
            tagging,
        })
    }

    /// The engine keeps a single transactional store file, per the durable
    /// store's "single-file transactional relational store" contract.
    pub fn store_db_path(&self) -> PathBuf {
        self.db_dir.join("nomad.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_temp_db_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            library_root: Some(PathBuf::from("/music")),
            pool_size: Some(4),
            poll_interval_sec: Some(5),
            job_timeout_sec: Some(1800),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.library_root, PathBuf::from("/music"));
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.poll_interval_sec, 5);
        assert_eq!(config.job_timeout_sec, 1800);
        assert_eq!(config.tagging.namespace, "nom");
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/should/be/overridden")),
            library_root: Some(PathBuf::from("/cli/music")),
            pool_size: Some(1),
            ..Default::default()
        };

        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            library_root: Some("/toml/music".to_string()),
            pool_size: Some(8),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.library_root, PathBuf::from("/toml/music"));
        assert_eq!(config.pool_size, 8);
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let cli = CliConfig::default();
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_dir must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_db_dir_error() {
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/nonexistent/path/that/should/not/exist")),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_db_dir_not_directory_error() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            db_dir: Some(temp_file.path().to_path_buf()),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not a directory"));
    }

    #[test]
    fn test_resolve_models_dir_defaults_to_db_dir_subdir() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            library_root: Some(PathBuf::from("/music")),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, None).unwrap();
        assert_eq!(config.models_dir, temp_dir.path().join("models"));
    }

    #[test]
    fn test_db_path_helpers() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            library_root: Some(PathBuf::from("/music")),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.store_db_path(), temp_dir.path().join("nomad.db"));
    }
}
