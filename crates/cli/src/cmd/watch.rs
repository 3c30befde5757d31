//! Run the watcher until interrupted

use crate::output;
use anyhow::{bail, Context, Result};
use settle_watcher::{CallbackEvent, Watcher, WatcherConfig};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub async fn run(roots: &[PathBuf], config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = match config_path {
        Some(path) => WatcherConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => WatcherConfig::default(),
    };

    let roots = resolve_roots(roots)?;
    let color = !json && std::io::stdout().is_terminal();

    let watcher = Watcher::new(config);
    watcher.set_path_callback_listener(Arc::new(
        move |event: &CallbackEvent| -> anyhow::Result<()> {
            let line = output::callback_line(event, json, color)?;
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", line)?;
            stdout.flush()?;
            Ok(())
        },
    ));

    watcher
        .start(&roots)
        .await
        .context("Failed to start watcher")?;
    info!(
        roots = roots.len(),
        directories = watcher.watched_paths().await.len(),
        "Watching (ctrl-c to stop)"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    info!("Stopping watcher");
    watcher.graceful_stop().await;
    Ok(())
}

/// Absolute, existing directories only
fn resolve_roots(roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut resolved = Vec::with_capacity(roots.len());
    for root in roots {
        let abs = std::fs::canonicalize(root)
            .with_context(|| format!("Cannot watch {}", root.display()))?;
        if !abs.is_dir() {
            bail!("Not a directory: {}", abs.display());
        }
        resolved.push(abs);
    }
    Ok(resolved)
}
