//! Error types for the watch pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the watcher and its backend
#[derive(Debug, Error)]
pub enum WatcherError {
    /// The OS notification backend could not be constructed
    #[error("failed to initialize watch backend: {0}")]
    BackendInit(#[source] notify::Error),

    /// Adding or removing a low-level watch failed
    #[error("watch operation failed for {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The path had no active watch (already dropped by the backend)
    #[error("no active watch for {0}")]
    WatchNotFound(PathBuf),

    /// Error reported asynchronously on the backend error stream
    #[error("watch backend error: {0}")]
    Backend(#[from] notify::Error),

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl WatcherError {
    /// True when the error only says the watch was already gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, WatcherError::WatchNotFound(_))
    }
}

/// Result type for watcher operations
pub type Result<T> = std::result::Result<T, WatcherError>;
