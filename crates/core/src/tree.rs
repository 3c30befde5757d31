//! Tree representation for directory snapshots
//!
//! A [`Tree`] records every file and directory under a root together
//! with size and modification time. Two trees can be compared with
//! [`Tree::diff`]; nothing here reads file contents.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

/// Errors from building or updating a tree
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to read metadata for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path {path} is not under root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("parent {0} not found in tree")]
    MissingParent(PathBuf),
}

pub type Result<T> = std::result::Result<T, TreeError>;

/// Type of tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Directory,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::File => f.write_str("File"),
            NodeKind::Directory => f.write_str("Directory"),
        }
    }
}

/// One file or directory in the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub abs_path: PathBuf,
    pub kind: NodeKind,
    pub size: u64,
    pub modified: Option<SystemTime>,
    /// Children by name (always empty for files)
    pub children: BTreeMap<String, Node>,
}

impl Node {
    fn from_metadata(name: String, abs_path: PathBuf, meta: &Metadata) -> Self {
        Self {
            name,
            abs_path,
            kind: if meta.is_dir() {
                NodeKind::Directory
            } else {
                NodeKind::File
            },
            size: meta.len(),
            modified: meta.modified().ok(),
            children: BTreeMap::new(),
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Number of nodes in this subtree, including self
    pub fn count(&self) -> usize {
        1 + self.children.values().map(Node::count).sum::<usize>()
    }

    fn render_into(&self, prefix: &str, out: &mut String) {
        let modified = self
            .modified
            .map(|t| {
                chrono::DateTime::<chrono::Local>::from(t)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!(
            "{}{} ({})({})({})({})\n",
            prefix,
            self.name,
            self.kind,
            self.size,
            modified,
            self.abs_path.display()
        ));

        let child_prefix = format!("{}  ", prefix);
        for child in self.children.values() {
            child.render_into(&child_prefix, out);
        }
    }
}

/// Snapshot of a directory tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    root: Node,
}

impl Tree {
    /// Walk `root` and record everything below it
    pub fn build(root: &Path) -> Result<Self> {
        let meta = std::fs::metadata(root).map_err(|source| TreeError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        let mut tree = Self {
            root: Node::from_metadata(
                std::path::MAIN_SEPARATOR.to_string(),
                root.to_path_buf(),
                &meta,
            ),
        };
        tree.insert_walk(root, 1)?;
        Ok(tree)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_path(&self) -> &Path {
        &self.root.abs_path
    }

    /// Total number of nodes, including the root
    pub fn len(&self) -> usize {
        self.root.count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Look up a node by path relative to the root
    pub fn get(&self, rel_path: &Path) -> Option<&Node> {
        let mut node = &self.root;
        for name in normal_components(rel_path) {
            node = node.children.get(&name)?;
        }
        Some(node)
    }

    /// Re-scan the subtree at `sub_path` (absolute, under the root)
    ///
    /// The old node is dropped and rebuilt from disk. If the path no
    /// longer exists it is simply removed.
    pub fn update(&mut self, sub_path: &Path) -> Result<()> {
        let rel = sub_path
            .strip_prefix(&self.root.abs_path)
            .map_err(|_| TreeError::OutsideRoot {
                path: sub_path.to_path_buf(),
                root: self.root.abs_path.clone(),
            })?
            .to_path_buf();

        let mut names = normal_components(&rel);
        let Some(last) = names.pop() else {
            *self = Tree::build(&self.root.abs_path.clone())?;
            return Ok(());
        };

        let mut parent = &mut self.root;
        let mut walked = PathBuf::new();
        for name in names {
            walked.push(&name);
            parent = parent
                .children
                .get_mut(&name)
                .ok_or_else(|| TreeError::MissingParent(walked.clone()))?;
        }
        parent.children.remove(&last);

        if std::fs::symlink_metadata(sub_path).is_ok() {
            self.insert_walk(sub_path, 0)?;
        }
        Ok(())
    }

    /// Compare against a newer tree
    ///
    /// `self` is the old side. A kind change (file to directory or back)
    /// is one `Modified` entry, not a delete plus an add.
    pub fn diff(&self, newer: &Tree) -> Vec<TreeDiff> {
        let mut out = Vec::new();
        diff_nodes(&self.root, &newer.root, Path::new(""), &mut out);
        out
    }

    /// Indented listing of every node
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.root.render_into("", &mut out);
        out
    }

    fn insert_walk(&mut self, start: &Path, min_depth: usize) -> Result<()> {
        let root = self.root.abs_path.clone();
        for entry in WalkDir::new(start)
            .min_depth(min_depth)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry?;
            let meta = entry.metadata()?;
            let rel = entry
                .path()
                .strip_prefix(&root)
                .map_err(|_| TreeError::OutsideRoot {
                    path: entry.path().to_path_buf(),
                    root: root.clone(),
                })?
                .to_path_buf();
            self.insert(&rel, &meta);
        }
        Ok(())
    }

    fn insert(&mut self, rel: &Path, meta: &Metadata) {
        let mut node = &mut self.root;
        let mut names = normal_components(rel).into_iter().peekable();

        while let Some(name) = names.next() {
            let is_leaf = names.peek().is_none();
            let abs_path = node.abs_path.join(&name);
            node = node.children.entry(name.clone()).or_insert_with(|| Node {
                name,
                abs_path,
                kind: NodeKind::Directory,
                size: 0,
                modified: None,
                children: BTreeMap::new(),
            });

            if is_leaf {
                let fresh = Node::from_metadata(node.name.clone(), node.abs_path.clone(), meta);
                node.kind = fresh.kind;
                node.size = fresh.size;
                node.modified = fresh.modified;
            }
        }
    }
}

/// Kind of difference between two trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffOp {
    Deleted,
    Added,
    Modified,
}

impl fmt::Display for DiffOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffOp::Deleted => f.write_str("deleted"),
            DiffOp::Added => f.write_str("added"),
            DiffOp::Modified => f.write_str("modified"),
        }
    }
}

/// One difference between two trees
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDiff {
    /// Absolute path (old side for deletions, new side otherwise)
    pub abs_path: PathBuf,
    /// Path relative to the tree root
    pub rel_path: PathBuf,
    pub op: DiffOp,
}

impl fmt::Display for TreeDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.op,
            self.rel_path.display(),
            self.abs_path.display()
        )
    }
}

fn diff_nodes(old: &Node, new: &Node, rel: &Path, out: &mut Vec<TreeDiff>) {
    if old.kind != new.kind {
        out.push(TreeDiff {
            abs_path: new.abs_path.clone(),
            rel_path: rel.to_path_buf(),
            op: DiffOp::Modified,
        });
        return;
    }

    if old.is_file() {
        if old.size != new.size || old.modified != new.modified {
            out.push(TreeDiff {
                abs_path: new.abs_path.clone(),
                rel_path: rel.to_path_buf(),
                op: DiffOp::Modified,
            });
        }
        return;
    }

    for (name, old_child) in &old.children {
        let child_rel = rel.join(name);
        match new.children.get(name) {
            Some(new_child) => diff_nodes(old_child, new_child, &child_rel, out),
            None => out.push(TreeDiff {
                abs_path: old_child.abs_path.clone(),
                rel_path: child_rel,
                op: DiffOp::Deleted,
            }),
        }
    }

    for (name, new_child) in &new.children {
        if !old.children.contains_key(name) {
            out.push(TreeDiff {
                abs_path: new_child.abs_path.clone(),
                rel_path: rel.join(name),
                op: DiffOp::Added,
            });
        }
    }
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}
