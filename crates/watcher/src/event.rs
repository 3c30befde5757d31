//! Event types flowing through the pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Type of low-level change reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    /// Path created
    Create,
    /// Content written
    Write,
    /// Path deleted
    Remove,
    /// Path renamed (either side of the move)
    Rename,
    /// Metadata or permissions changed
    Chmod,
    /// Anything the backend could not classify
    Unknown,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Create => "CREATE",
            Op::Write => "WRITE",
            Op::Remove => "REMOVE",
            Op::Rename => "RENAME",
            Op::Chmod => "CHMOD",
            Op::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw event straight from the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Absolute path that changed
    pub path: PathBuf,
    pub op: Op,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, op: Op) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }
}

/// Unit flowing into the debounce stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChangeEvent {
    pub path: PathBuf,
    /// Operation label, kept for logging only
    pub op: Op,
}

impl FileChangeEvent {
    pub fn new(path: impl Into<PathBuf>, op: Op) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }
}

impl From<RawEvent> for FileChangeEvent {
    fn from(event: RawEvent) -> Self {
        Self {
            path: event.path,
            op: event.op,
        }
    }
}

/// Terminal notification delivered to the observer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallbackEvent {
    /// Path that changed
    pub path: PathBuf,
    /// Whether the path still exists once settled
    pub exists: bool,
}

impl CallbackEvent {
    pub fn settled(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            exists: true,
        }
    }

    pub fn gone(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            exists: false,
        }
    }
}
