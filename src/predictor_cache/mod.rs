//! Process-wide cache of loaded ML predictor handles, keyed by
//! `(model name, backbone, head type)`.
//!
//! Ported from `nomarr/ml/cache.py`. Model loading itself is opaque —
//! callers inject a [`ModelLoader`] — so this module only implements the
//! cache's state machine: warmup, touch, idle eviction, clear. Only ever
//! instantiated inside the worker subprocess, never the parent process.

use anyhow::Result;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Composite key identifying one loaded head.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeadSpec {
    pub model_name: String,
    pub backbone: String,
    pub head_type: String,
}

impl fmt::Display for HeadSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.model_name, self.backbone, self.head_type)
    }
}

/// An opaque, loaded predictor. Loading and inference are non-goals here;
/// this crate only manages the handle's lifetime.
pub trait PredictorHandle: Send + Sync {}

/// Discovers and loads predictor heads under a models directory.
pub trait ModelLoader: Send + Sync {
    fn discover(&self, models_dir: &Path) -> Result<Vec<HeadSpec>>;
    fn load(&self, head: &HeadSpec) -> Result<Box<dyn PredictorHandle>>;
}

struct State {
    initialized: bool,
    last_access_ms: i64,
    entries: HashMap<HeadSpec, Box<dyn PredictorHandle>>,
}

/// Thread-safe cache of loaded predictors. `auto_evict`/`idle_timeout_ms`
/// mirror [`crate::config::PredictorSettings`].
pub struct PredictorCache {
    state: Mutex<State>,
    auto_evict: bool,
    idle_timeout_ms: i64,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}

impl PredictorCache {
    pub fn new(auto_evict: bool, idle_timeout_sec: u64) -> Self {
        Self {
            state: Mutex::new(State {
                initialized: false,
                last_access_ms: now_ms(),
                entries: HashMap::new(),
            }),
            auto_evict,
            idle_timeout_ms: (idle_timeout_sec as i64) * 1000,
        }
    }

    /// Discover and load every head under `models_dir`. Idempotent:
    /// returns the current size without reloading if already initialized.
    pub fn warmup(&self, models_dir: &Path, loader: &dyn ModelLoader) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        if state.initialized {
            return Ok(state.entries.len());
        }

        let heads = loader.discover(models_dir)?;
        for head in &heads {
            let handle = loader.load(head)?;
            state.entries.insert(head.clone(), handle);
        }
        state.initialized = true;
        state.last_access_ms = now_ms();
        info!(count = state.entries.len(), "predictor cache warmed up");
        Ok(state.entries.len())
    }

    pub fn touch(&self) {
        let mut state = self.state.lock().unwrap();
        state.last_access_ms = now_ms();
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().unwrap().initialized
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evicts all entries and releases native resources if idle past the
    /// configured timeout. Returns whether an eviction happened.
    pub fn check_and_evict_if_idle(&self) -> bool {
        if !self.auto_evict || self.idle_timeout_ms <= 0 {
            return false;
        }

        let mut state = self.state.lock().unwrap();
        if !state.initialized {
            return false;
        }
        let idle_for = now_ms() - state.last_access_ms;
        if idle_for <= self.idle_timeout_ms {
            return false;
        }

        let evicted = state.entries.len();
        state.entries.clear();
        state.initialized = false;
        warn!(evicted, idle_for_ms = idle_for, "predictor cache evicted after idle timeout");
        true
    }

    /// Unconditional release, regardless of idle time or `auto_evict`.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.entries.clear();
        state.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandle;
    impl PredictorHandle for NoopHandle {}

    struct FakeLoader {
        heads: Vec<HeadSpec>,
    }

    impl ModelLoader for FakeLoader {
        fn discover(&self, _models_dir: &Path) -> Result<Vec<HeadSpec>> {
            Ok(self.heads.clone())
        }
        fn load(&self, _head: &HeadSpec) -> Result<Box<dyn PredictorHandle>> {
            Ok(Box::new(NoopHandle))
        }
    }

    fn head(name: &str) -> HeadSpec {
        HeadSpec {
            model_name: name.to_string(),
            backbone: "resnet".to_string(),
            head_type: "genre".to_string(),
        }
    }

    #[test]
    fn test_warmup_populates_and_is_idempotent() {
        let cache = PredictorCache::new(true, 600);
        let loader = FakeLoader {
            heads: vec![head("a"), head("b")],
        };
        let count = cache.warmup(Path::new("/models"), &loader).unwrap();
        assert_eq!(count, 2);
        assert!(cache.is_initialized());

        let second = cache.warmup(Path::new("/models"), &loader).unwrap();
        assert_eq!(second, 2);
    }

    #[test]
    fn test_clear_unconditional() {
        let cache = PredictorCache::new(false, 0);
        let loader = FakeLoader { heads: vec![head("a")] };
        cache.warmup(Path::new("/models"), &loader).unwrap();
        cache.clear();
        assert!(!cache.is_initialized());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_evict_respects_auto_evict_flag() {
        let cache = PredictorCache::new(false, 0);
        let loader = FakeLoader { heads: vec![head("a")] };
        cache.warmup(Path::new("/models"), &loader).unwrap();
        assert!(!cache.check_and_evict_if_idle());
        assert!(cache.is_initialized());
    }
}
