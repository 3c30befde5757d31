//! Central event loop
//!
//! Consumes raw backend events in delivery order, classifies each one by
//! its stat result and operation, and drives the rest of the pipeline:
//!
//! | stat        | op              | route                                   |
//! |-------------|-----------------|-----------------------------------------|
//! | fails       | any             | unwatch, forward to the debounce stage  |
//! | directory   | Create          | mark pending, reset batched refresh     |
//! | directory   | Remove / Rename | unwatch, suppress (stat failure emits)  |
//! | directory   | Write / Chmod   | ignore                                  |
//! | file        | any             | forward to the debounce stage           |
//!
//! Missing paths go through the same debounce and single-flight stage as
//! file changes, so the several signals one deletion produces (the
//! parent's entry removal, the directory's own delete-self) collapse into
//! a single `{exists: false}` notification.

use crate::debounce::DebounceCoalescer;
use crate::error::WatcherError;
use crate::event::{FileChangeEvent, Op, RawEvent};
use crate::pending::PendingPathSet;
use crate::processor::PathProcessor;
use crate::scheduler::DelayedTaskScheduler;
use crate::signal::StopSignal;
use crate::watchset::WatchSetManager;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What the stat call said about an event path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Missing,
    Directory,
    File,
}

impl PathKind {
    fn of(metadata: std::io::Result<std::fs::Metadata>) -> Self {
        match metadata {
            Err(_) => PathKind::Missing,
            Ok(meta) if meta.is_dir() => PathKind::Directory,
            Ok(_) => PathKind::File,
        }
    }
}

/// Routing decision for one raw event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Path no longer exists: unwatch and let the stability check report it
    Gone,
    /// New directory: batch a refresh
    ScheduleRefresh,
    /// Directory going away: unwatch but let the follow-up event notify
    UnwatchSuppressed,
    /// File change: hand to the debounce stage
    Forward,
    /// Metadata-only or unknown directory change
    Ignore,
}

/// Classify an event from its operation and stat result
pub fn classify(op: Op, kind: PathKind) -> Route {
    match kind {
        PathKind::Missing => Route::Gone,
        PathKind::File => Route::Forward,
        PathKind::Directory => match op {
            Op::Create => Route::ScheduleRefresh,
            Op::Remove | Op::Rename => Route::UnwatchSuppressed,
            Op::Write | Op::Chmod | Op::Unknown => Route::Ignore,
        },
    }
}

/// Classifies raw events and feeds the other components
pub struct RawEventRouter {
    watch_set: Arc<WatchSetManager>,
    pending: Arc<PendingPathSet>,
    scheduler: Arc<DelayedTaskScheduler>,
    coalescer: Arc<DebounceCoalescer>,
    processor: Arc<PathProcessor>,
    batch_delay: Duration,
}

impl RawEventRouter {
    pub fn new(
        watch_set: Arc<WatchSetManager>,
        pending: Arc<PendingPathSet>,
        scheduler: Arc<DelayedTaskScheduler>,
        coalescer: Arc<DebounceCoalescer>,
        processor: Arc<PathProcessor>,
        batch_delay: Duration,
    ) -> Self {
        Self {
            watch_set,
            pending,
            scheduler,
            coalescer,
            processor,
            batch_delay,
        }
    }

    /// Run until `stop` triggers
    ///
    /// Backend errors are logged and never end the loop. A closed stream
    /// is simply no longer polled.
    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<RawEvent>,
        mut errors: mpsc::UnboundedReceiver<WatcherError>,
        stop: StopSignal,
    ) {
        let mut events_open = true;
        let mut errors_open = true;
        info!("Event loop running");

        loop {
            tokio::select! {
                biased;

                _ = stop.triggered() => {
                    break;
                }
                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        self.route(event).await;
                    }
                    None => {
                        warn!("Backend event stream closed");
                        events_open = false;
                    }
                },
                err = errors.recv(), if errors_open => match err {
                    Some(e) => warn!("Watch backend reported: {}", e),
                    None => {
                        debug!("Backend error stream closed");
                        errors_open = false;
                    }
                },
            }
        }

        // Idempotent; a second trigger is a no-op
        stop.trigger();
        info!("Event loop stopped");
    }

    /// Classify and apply one event
    pub async fn route(&self, event: RawEvent) -> Route {
        let kind = PathKind::of(tokio::fs::metadata(&event.path).await);
        let route = classify(event.op, kind);
        debug!("{} {} ({:?}) -> {:?}", event.op, event.path.display(), kind, route);

        if kind != PathKind::Missing {
            self.processor.note_present(&event.path);
        }

        match route {
            Route::Gone => {
                self.unwatch(&event.path).await;
                self.coalescer.send(FileChangeEvent::from(event));
            }
            Route::ScheduleRefresh => self.schedule_refresh(event.path),
            Route::UnwatchSuppressed => {
                self.unwatch(&event.path).await;
            }
            Route::Forward => {
                self.coalescer.send(FileChangeEvent::from(event));
            }
            Route::Ignore => {}
        }
        route
    }

    /// Drop the watch on the blocking pool; a running refresh holds the watch-set lock
    async fn unwatch(&self, path: &Path) {
        let watch_set = self.watch_set.clone();
        let path = path.to_path_buf();
        if let Err(e) = tokio::task::spawn_blocking(move || watch_set.remove(&path)).await {
            warn!("Unwatch task failed: {}", e);
        }
    }

    /// Mark the directory and restart the quiet-period timer
    fn schedule_refresh(&self, dir: PathBuf) {
        self.pending.mark(&dir);
        self.scheduler.cancel_all();

        let pending = self.pending.clone();
        let coalescer = self.coalescer.clone();
        let watch_set = self.watch_set.clone();
        self.scheduler.add_task(self.batch_delay, async move {
            let dirs = pending.drain_all();
            if dirs.is_empty() {
                return;
            }

            info!("Batched refresh of {} new director(ies)", dirs.len());
            for dir in &dirs {
                coalescer.send(FileChangeEvent::new(dir.clone(), Op::Create));
            }

            let refreshed = tokio::task::spawn_blocking(move || watch_set.refresh(&dirs)).await;
            if let Err(e) = refreshed {
                warn!("Batched refresh task failed: {}", e);
            }
        });
    }
}
