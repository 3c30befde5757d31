//! Offline directory snapshots for settle
//!
//! This crate provides:
//! - Tree snapshots of a directory (kind, size, mtime per node)
//! - Subtree re-scans
//! - Tree-to-tree diffs (deleted / added / modified)
//!
//! It is independent of the live watch pipeline.

pub mod snapshot;
pub mod tree;

// Re-exports
pub use snapshot::Snapshot;
pub use tree::{DiffOp, Node, NodeKind, Tree, TreeDiff, TreeError};
