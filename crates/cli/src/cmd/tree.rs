//! Print a directory snapshot

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use settle_core::Tree;
use std::path::Path;

pub async fn run(root: &Path) -> Result<()> {
    let tree = build(root).await?;

    print!("{}", tree.render());
    println!();
    println!("{}", format!("{} entries", tree.len()).dimmed());
    Ok(())
}

/// Walk a tree off the async runtime
pub(crate) async fn build(root: &Path) -> Result<Tree> {
    let owned = root.to_path_buf();
    tokio::task::spawn_blocking(move || Tree::build(&owned))
        .await
        .context("Snapshot task failed")?
        .with_context(|| format!("Failed to snapshot {}", root.display()))
}
