//! Low-level watch backends
//!
//! The pipeline only needs non-recursive per-directory watches plus two
//! streams: raw events and backend errors. [`NotifyBackend`] provides them
//! on top of the platform's native facility (inotify, FSEvents, ...).

mod native;

pub use self::native::NotifyBackend;

use crate::error::{Result, WatcherError};
use crate::event::RawEvent;
use std::path::Path;
use tokio::sync::mpsc;

/// Per-directory watch registration
pub trait WatchBackend: Send + Sync + 'static {
    /// Start watching a single directory (non-recursive)
    fn add_watch(&self, path: &Path) -> Result<()>;

    /// Stop watching a directory
    ///
    /// Returns [`WatcherError::WatchNotFound`] when there was no watch.
    fn remove_watch(&self, path: &Path) -> Result<()>;
}

/// Receiving side of a backend's event and error streams
#[derive(Debug)]
pub struct BackendStreams {
    pub events: mpsc::UnboundedReceiver<RawEvent>,
    pub errors: mpsc::UnboundedReceiver<WatcherError>,
}

/// Sending side of a backend's streams
#[derive(Debug, Clone)]
pub struct BackendSinks {
    pub events: mpsc::UnboundedSender<RawEvent>,
    pub errors: mpsc::UnboundedSender<WatcherError>,
}

/// Create a connected pair of sinks and streams
pub fn backend_channels() -> (BackendSinks, BackendStreams) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (errors_tx, errors_rx) = mpsc::unbounded_channel();
    (
        BackendSinks {
            events: events_tx,
            errors: errors_tx,
        },
        BackendStreams {
            events: events_rx,
            errors: errors_rx,
        },
    )
}
