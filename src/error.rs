//! Crate-wide error type.
//!
//! Internal call sites use `anyhow::Result` with `.context(...)`, matching
//! the teacher's modules; `EngineError` is the typed boundary returned by
//! the facade and the CLI, one variant per row of the error-kind table.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found")]
    NotFound,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("processing timeout (>{0}s)")]
    Timeout(u64),

    #[error("worker crash: {0}")]
    WorkerCrash(String),

    #[error("extraction failed for {path}: {message}")]
    ExtractionFailure { path: String, message: String },

    #[error("store failure: {0}")]
    StoreFailure(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
