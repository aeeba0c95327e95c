//! `nomad-worker`: the OS-isolated child process the Worker Pool
//! Coordinator spawns (one per pool slot). Hosts the predictor cache
//! (C2) — it is only ever instantiated here, never in the parent.
//!
//! Wire format: one JSON object per line on stdin
//! (`{"path": "...", "force": bool}`), one JSON object per line on
//! stdout (`{"status": "ok", "result": {...}}` or `{"status": "error",
//! "error": "..."}`).

use clap::Parser;
use nomad_engine::predictor_cache::{HeadSpec, ModelLoader, PredictorCache, PredictorHandle};
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
struct WorkerArgs {
    #[clap(long)]
    models_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct JobRequest {
    path: String,
    force: bool,
}

struct NoopHandle;
impl PredictorHandle for NoopHandle {}

/// Discovers a directory of per-head model files under `models_dir`.
/// Loading itself is a non-goal (spec §4.2/§9); this loader only proves
/// out the cache's state machine with something that behaves like the
/// real thing.
struct DirectoryModelLoader;

impl ModelLoader for DirectoryModelLoader {
    fn discover(&self, models_dir: &Path) -> anyhow::Result<Vec<HeadSpec>> {
        let mut heads = Vec::new();
        if !models_dir.is_dir() {
            warn!(?models_dir, "models directory does not exist, starting with an empty cache");
            return Ok(heads);
        }
        for entry in std::fs::read_dir(models_dir)? {
            let entry = entry?;
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                let parts: Vec<&str> = stem.splitn(3, '_').collect();
                if let [model_name, backbone, head_type] = parts[..] {
                    heads.push(HeadSpec {
                        model_name: model_name.to_string(),
                        backbone: backbone.to_string(),
                        head_type: head_type.to_string(),
                    });
                }
            }
        }
        Ok(heads)
    }

    fn load(&self, _head: &HeadSpec) -> anyhow::Result<Box<dyn PredictorHandle>> {
        Ok(Box::new(NoopHandle))
    }
}

fn process(path: &str, force: bool, cache: &PredictorCache) -> anyhow::Result<Value> {
    cache.touch();
    if !Path::new(path).exists() {
        anyhow::bail!("file not found: {}", path);
    }
    // Tag extraction/writing itself is a non-goal; the worker's
    // responsibility here is to prove the opaque `Process(path, force)`
    // contract the coordinator relies on.
    Ok(json!({ "path": path, "force": force, "tagged": true }))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let args = WorkerArgs::parse();
    let cache = PredictorCache::new(true, 600);
    let loader = DirectoryModelLoader;

    match cache.warmup(&args.models_dir, &loader) {
        Ok(count) => info!(count, "worker predictor cache warmed up"),
        Err(e) => warn!(error = %e, "warmup failed, continuing with an empty cache"),
    }

    let stdin = io::stdin();
    let stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JobRequest>(&line) {
            Ok(req) => match process(&req.path, req.force, &cache) {
                Ok(result) => json!({ "status": "ok", "result": result }),
                Err(e) => json!({ "status": "error", "error": e.to_string() }),
            },
            Err(e) => {
                error!(error = %e, "malformed job request");
                json!({ "status": "error", "error": format!("malformed request: {}", e) })
            }
        };

        let mut out = stdout.lock();
        writeln!(out, "{}", serde_json::to_string(&response)?)?;
        out.flush()?;

        cache.check_and_evict_if_idle();
    }

    Ok(())
}
