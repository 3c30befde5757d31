//! `notify`-based backend

use super::{backend_channels, BackendSinks, BackendStreams, WatchBackend};
use crate::error::{Result, WatcherError};
use crate::event::{Op, RawEvent};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::Mutex;
use std::path::Path;
use tracing::debug;

/// Watch backend over the platform's recommended `notify` watcher
pub struct NotifyBackend {
    inner: Mutex<RecommendedWatcher>,
}

impl NotifyBackend {
    /// Construct the native watcher and its streams
    pub fn new() -> Result<(Self, BackendStreams)> {
        let (sinks, streams) = backend_channels();
        let watcher = notify::recommended_watcher(move |res| forward(&sinks, res))
            .map_err(WatcherError::BackendInit)?;

        Ok((
            Self {
                inner: Mutex::new(watcher),
            },
            streams,
        ))
    }
}

impl WatchBackend for NotifyBackend {
    fn add_watch(&self, path: &Path) -> Result<()> {
        self.inner
            .lock()
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|source| WatcherError::Watch {
                path: path.to_path_buf(),
                source,
            })
    }

    fn remove_watch(&self, path: &Path) -> Result<()> {
        self.inner.lock().unwatch(path).map_err(|source| match source.kind {
            notify::ErrorKind::WatchNotFound => WatcherError::WatchNotFound(path.to_path_buf()),
            _ => WatcherError::Watch {
                path: path.to_path_buf(),
                source,
            },
        })
    }
}

fn forward(sinks: &BackendSinks, res: notify::Result<Event>) {
    match res {
        Ok(event) => {
            let op = classify_kind(&event.kind);
            for path in event.paths {
                // Receiver gone means the run is over
                if sinks.events.send(RawEvent::new(path, op)).is_err() {
                    debug!("Dropping backend event after shutdown");
                    return;
                }
            }
        }
        Err(e) => {
            let _ = sinks.errors.send(WatcherError::Backend(e));
        }
    }
}

/// Map a notify event kind onto the pipeline's operation set
pub(crate) fn classify_kind(kind: &EventKind) -> Op {
    match kind {
        EventKind::Create(_) => Op::Create,
        EventKind::Modify(ModifyKind::Name(_)) => Op::Rename,
        EventKind::Modify(ModifyKind::Metadata(_)) => Op::Chmod,
        EventKind::Modify(_) => Op::Write,
        EventKind::Remove(_) => Op::Remove,
        _ => Op::Unknown,
    }
}
