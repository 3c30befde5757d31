//! Old/current snapshot pair for incremental comparisons

use crate::tree::{Result, Tree, TreeDiff};
use parking_lot::RwLock;
use std::path::Path;

struct State {
    old: Tree,
    current: Tree,
}

/// Keeps a baseline tree and a working copy that is updated per directory
///
/// `diff_and_sync` reports what changed since the baseline and, if
/// anything did, moves the baseline forward.
pub struct Snapshot {
    state: RwLock<State>,
}

impl Snapshot {
    /// Build the baseline from disk
    pub fn init(root: &Path) -> Result<Self> {
        let old = Tree::build(root)?;
        let current = old.clone();
        Ok(Self {
            state: RwLock::new(State { old, current }),
        })
    }

    /// Re-scan one changed path in the working copy
    pub fn update_changed_dir(&self, changed: &Path) -> Result<()> {
        self.state.write().current.update(changed)
    }

    /// Diff baseline against the working copy, then promote the copy
    pub fn diff_and_sync(&self) -> Vec<TreeDiff> {
        let mut state = self.state.write();
        let diffs = state.old.diff(&state.current);
        if !diffs.is_empty() {
            state.old = state.current.clone();
        }
        diffs
    }

    /// Clone of the working copy
    pub fn current(&self) -> Tree {
        self.state.read().current.clone()
    }
}
