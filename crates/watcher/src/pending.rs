//! Directories waiting for the next batched refresh

use dashmap::DashMap;
use std::path::{Path, PathBuf};

/// Synchronized set of directories marked for re-traversal
#[derive(Debug, Default)]
pub struct PendingPathSet {
    marks: DashMap<PathBuf, bool>,
}

impl PendingPathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a directory as needing a refresh (idempotent)
    pub fn mark(&self, path: &Path) {
        self.marks.insert(path.to_path_buf(), true);
    }

    /// Take every marked directory
    ///
    /// Order is not significant. A mark lives until the batched refresh
    /// consumes it: drained entries are removed here, so a directory is
    /// only refreshed (and announced) again if it is marked again.
    pub fn drain_all(&self) -> Vec<PathBuf> {
        let marked: Vec<PathBuf> = self
            .marks
            .iter()
            .filter(|entry| *entry.value())
            .map(|entry| entry.key().clone())
            .collect();

        for path in &marked {
            // Only drop entries still marked; a concurrent re-mark keeps its flag
            self.marks.remove_if(path, |_, pending| *pending);
        }
        marked
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}
