//! Watch-set reconciliation
//!
//! Walks the given roots, collects every reachable directory, and
//! (re)registers one non-recursive watch per directory. Files are never
//! watched individually; their events arrive through the parent's watch.

use crate::platform::WatchBackend;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Outcome of a refresh pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Directories that now carry a fresh watch
    pub watched: usize,
    /// Directories whose add failed and remain unwatched
    pub failed: usize,
}

/// Owns the set of low-level watches
///
/// The mutex around the watched set is the single lock serializing every
/// add/remove, whether it comes from the initial traversal, a batched
/// refresh, or a removal routed from the event loop. It is held for one
/// directory's remove/add pair at a time, never across the walk.
pub struct WatchSetManager {
    backend: Arc<dyn WatchBackend>,
    watched: Mutex<HashSet<PathBuf>>,
}

impl WatchSetManager {
    pub fn new(backend: Arc<dyn WatchBackend>) -> Self {
        Self {
            backend,
            watched: Mutex::new(HashSet::new()),
        }
    }

    /// Re-traverse `roots` and re-watch every directory found
    ///
    /// Blocking: walks the filesystem. Failures on individual paths are
    /// logged and skipped.
    pub fn refresh(&self, roots: &[PathBuf]) -> RefreshReport {
        let mut directories = BTreeSet::new();
        for root in roots {
            collect_directories(root, &mut directories);
        }

        let mut report = RefreshReport::default();

        for dir in &directories {
            let mut watched = self.watched.lock();
            // Drop any existing watch first so each directory holds exactly one
            match self.backend.remove_watch(dir) {
                Ok(()) => debug!("Removed existing watch before re-adding: {}", dir.display()),
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!("Failed to remove watch before re-adding: {}", e),
            }
            watched.remove(dir);

            match self.backend.add_watch(dir) {
                Ok(()) => {
                    debug!("Watching {}", dir.display());
                    watched.insert(dir.clone());
                    report.watched += 1;
                }
                Err(e) => {
                    warn!("Failed to watch directory: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Refreshed watches under {} root(s): {} watched, {} failed",
            roots.len(),
            report.watched,
            report.failed
        );
        report
    }

    /// Drop the watch on a single directory
    ///
    /// Failure is ignored: the backend may already have dropped it. Returns
    /// whether the path was tracked as watched.
    pub fn remove(&self, path: &Path) -> bool {
        let mut watched = self.watched.lock();
        if !watched.remove(path) {
            return false;
        }

        match self.backend.remove_watch(path) {
            Ok(()) => debug!("Removed watch: {}", path.display()),
            Err(e) if e.is_not_found() => debug!("Watch already gone: {}", path.display()),
            Err(e) => warn!("Failed to remove watch: {}", e),
        }
        true
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.watched.lock().contains(path)
    }

    /// Sorted snapshot of the watched directories
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.watched.lock().iter().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.watched.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.watched.lock().is_empty()
    }
}

/// Collect `root` and every directory below it
///
/// Unreadable subtrees are logged and skipped; siblings are still walked.
pub fn collect_directories(root: &Path, out: &mut BTreeSet<PathBuf>) {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable path during traversal: {}", e);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            out.insert(entry.into_path());
        }
    }
}
