//! Compare two directory trees

use super::tree::build;
use crate::output;
use anyhow::Result;
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::Path;

pub async fn run(old: &Path, new: &Path, json: bool) -> Result<()> {
    let (old_tree, new_tree) = tokio::try_join!(build(old), build(new))?;
    let diffs = old_tree.diff(&new_tree);

    if json {
        println!("{}", serde_json::to_string_pretty(&diffs)?);
        return Ok(());
    }

    let color = std::io::stdout().is_terminal();
    println!(
        "{}",
        format!("Diff: {} → {}", old.display(), new.display()).bold()
    );
    println!("{}", "━".repeat(60).dimmed());

    if diffs.is_empty() {
        println!("{}", "No differences".dimmed());
        return Ok(());
    }

    for diff in &diffs {
        println!("{}", output::diff_line(diff, color));
    }
    println!();
    println!("{}", output::diff_summary(&diffs).dimmed());
    Ok(())
}
