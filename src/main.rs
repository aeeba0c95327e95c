use anyhow::Result;
use clap::{Parser, Subcommand};
use nomad_engine::config::{self, AppConfig, CliConfig};
use nomad_engine::facade::Engine;
use nomad_engine::scanner::{LibraryScanner, MetadataExtractor, NormalizationRules, RawMetadata};
use nomad_engine::store::{JobStatus, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "nomad-engine", version = env!("APP_VERSION"))]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(long, global = true)]
    db_dir: Option<PathBuf>,

    #[clap(long, global = true)]
    library_root: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enqueue one or more paths for tagging.
    Enqueue {
        paths: Vec<String>,
        #[clap(long)]
        force: bool,
        #[clap(long)]
        recursive: bool,
    },
    /// Print aggregate queue status.
    Status,
    /// Run a library scan.
    Scan {
        #[clap(long)]
        library_id: i64,
        #[clap(long)]
        incremental: bool,
    },
    /// Reset stuck/errored jobs back to pending.
    Reset {
        #[clap(long)]
        stuck: bool,
        #[clap(long)]
        errors: bool,
    },
    /// Delete terminal jobs.
    Flush {
        #[clap(long)]
        done: bool,
        #[clap(long)]
        error: bool,
    },
    /// Disable the worker loops without stopping the process.
    Pause,
    /// Re-enable worker loops after a pause.
    Resume,
    /// Run the engine: open the store, start the worker pool and loops,
    /// block until Ctrl+C.
    Serve,
}

/// Non-goal metadata extraction: returns empty metadata/fingerprints so
/// the scanner's orchestration logic is fully exercised by the CLI
/// without depending on an external tagging library.
struct NullExtractor;
impl MetadataExtractor for NullExtractor {
    fn extract(&self, _path: &std::path::Path) -> anyhow::Result<RawMetadata> {
        Ok(RawMetadata::default())
    }
    fn chromaprint(&self, _path: &std::path::Path) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .ok();
}

fn resolve_config(cli_args: &CliArgs) -> Result<AppConfig> {
    let file_config = match &cli_args.config {
        Some(path) => {
            info!(?path, "loading configuration file");
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        library_root: cli_args.library_root.clone(),
        ..Default::default()
    };

    Ok(AppConfig::resolve(&cli_config, file_config)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli_args = CliArgs::parse();
    let app_config = resolve_config(&cli_args)?;

    let store = Arc::new(SqliteStore::new(app_config.store_db_path())?);
    {
        use nomad_engine::store::LibraryStore;
        store.ensure_default_library("default", &app_config.library_root.to_string_lossy())?;
    }

    match cli_args.command {
        Command::Enqueue { paths, force, recursive } => {
            let scanner = build_scanner(&app_config, store.clone());
            let worker_bin = sibling_worker_binary()?;
            let engine = Engine::start(app_config, store, scanner, worker_bin).await?;
            let result = engine.enqueue(&paths, force, recursive)?;
            println!(
                "queued {} file(s), {} job(s), queue depth now {}",
                result.files_queued,
                result.job_ids.len(),
                result.queue_depth
            );
            engine.shutdown().await?;
        }
        Command::Status => {
            let scanner = build_scanner(&app_config, store.clone());
            let worker_bin = sibling_worker_binary()?;
            let engine = Engine::start(app_config, store, scanner, worker_bin).await?;
            let status = engine.get_status()?;
            println!(
                "pending={} running={} done={} error={}",
                status.pending, status.running, status.done, status.error
            );
            engine.shutdown().await?;
        }
        Command::Scan { library_id, incremental } => {
            use nomad_engine::store::LibraryStore;
            let library = store
                .get_library(library_id)?
                .ok_or_else(|| anyhow::anyhow!("no such library: {}", library_id))?;
            let scanner = build_scanner(&app_config, store.clone());
            let result = if incremental {
                scanner.scan_incremental(&library)?
            } else {
                scanner.scan_full(&library)?
            };
            println!(
                "scan {} complete: +{} ~{} -{} moved={} errors={}",
                result.id, result.files_added, result.files_updated, result.files_removed, result.files_moved, result.files_errored
            );
        }
        Command::Reset { stuck, errors } => {
            use nomad_engine::store::JobStore;
            let mut reset = 0;
            if stuck {
                reset += store.reset_running_to_pending()?;
            }
            if errors {
                reset += store.reset_errors_to_pending()?;
            }
            println!("reset {} job(s)", reset);
        }
        Command::Flush { done, error } => {
            use nomad_engine::store::JobStore;
            let mut statuses = Vec::new();
            if done {
                statuses.push(JobStatus::Done);
            }
            if error {
                statuses.push(JobStatus::Error);
            }
            if statuses.is_empty() {
                anyhow::bail!("pass at least one of --done / --error");
            }
            let removed = store.flush(&statuses)?;
            println!("removed {} job(s)", removed);
        }
        Command::Pause => {
            use nomad_engine::store::MetaStore;
            store.set_worker_enabled(false)?;
            println!("paused");
        }
        Command::Resume => {
            use nomad_engine::store::MetaStore;
            store.set_worker_enabled(true)?;
            println!("resumed");
        }
        Command::Serve => {
            let scanner = build_scanner(&app_config, store.clone());
            let worker_bin = sibling_worker_binary()?;
            let engine = Engine::start(app_config, store, scanner, worker_bin).await?;
            info!("nomad-engine serving; press Ctrl+C to stop");
            tokio::signal::ctrl_c().await?;
            info!("received Ctrl+C, shutting down");
            engine.shutdown().await?;
        }
    }

    Ok(())
}

fn build_scanner(app_config: &AppConfig, store: Arc<SqliteStore>) -> Arc<LibraryScanner<SqliteStore>> {
    let rules = NormalizationRules {
        namespace: app_config.tagging.namespace.clone(),
        freeform_blocklist: app_config.tagging.freeform_blocklist.clone(),
        version_tag_key: app_config.tagging.version_tag_key.clone(),
        tagger_version: app_config.tagging.tagger_version.clone(),
    };
    Arc::new(LibraryScanner::new(store, None, Arc::new(NullExtractor), rules))
}

fn sibling_worker_binary() -> Result<PathBuf> {
    let mut path = std::env::current_exe()?;
    path.set_file_name(if cfg!(windows) { "nomad-worker.exe" } else { "nomad-worker" });
    Ok(path)
}
