//! Line formatting for watch and diff output

use anyhow::Result;
use owo_colors::OwoColorize;
use settle_core::{DiffOp, TreeDiff};
use settle_watcher::CallbackEvent;

/// Format one watcher notification
///
/// JSON output fails for paths that are not valid UTF-8.
pub fn callback_line(event: &CallbackEvent, json: bool, color: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string(event)?);
    }

    let label = if event.exists { "settled" } else { "gone   " };
    let path = event.path.display();
    Ok(match (color, event.exists) {
        (false, _) => format!("{}  {}", label, path),
        (true, true) => format!("{}  {}", label.green(), path),
        (true, false) => format!("{}  {}", label.red(), path),
    })
}

/// Format one tree difference
pub fn diff_line(diff: &TreeDiff, color: bool) -> String {
    let (marker, path) = (diff_marker(diff.op), diff.rel_path.display());
    if !color {
        return format!("{} {}", marker, path);
    }
    match diff.op {
        DiffOp::Added => format!("{} {}", marker.green(), path),
        DiffOp::Deleted => format!("{} {}", marker.red(), path),
        DiffOp::Modified => format!("{} {}", marker.yellow(), path),
    }
}

fn diff_marker(op: DiffOp) -> &'static str {
    match op {
        DiffOp::Added => "+",
        DiffOp::Deleted => "-",
        DiffOp::Modified => "~",
    }
}

/// One-line tally of a diff
pub fn diff_summary(diffs: &[TreeDiff]) -> String {
    let count = |op| diffs.iter().filter(|d| d.op == op).count();
    format!(
        "{} added, {} deleted, {} modified",
        count(DiffOp::Added),
        count(DiffOp::Deleted),
        count(DiffOp::Modified)
    )
}
