//! Application-wide error types.
//!
//! Library modules use specific error types via `thiserror`, while CLI/main
//! uses `anyhow` for convenient error propagation. Persistence failures are
//! deliberately non-fatal: stores return a `Result` that callers log and
//! swallow, so storage I/O never aborts a batch.

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
///
/// Aggregates errors from all subsystems for unified handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON document read/write error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Session packaging error
    #[error("Packaging error: {0}")]
    Package(String),

    /// Persisted document could not be written
    #[error("Failed to persist {path}: {message}")]
    Persist { path: PathBuf, message: String },
}

impl Error {
    /// Create a packaging error.
    pub fn package(message: impl Into<String>) -> Self {
        Self::Package(message.into())
    }

    /// Create a persistence error.
    pub fn persist(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Persist {
            path: path.into(),
            message: message.into(),
        }
    }
}
