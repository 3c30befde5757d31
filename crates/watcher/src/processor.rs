//! Per-path stability checks
//!
//! A changed path is polled until it either disappears (gone) or can be
//! opened for reading (settled). At most one check per path runs at a
//! time; signals arriving while a check is in flight are dropped, since
//! the running check will observe the latest state on its next poll.
//!
//! A disappearance is reported once: after a path has been reported gone,
//! further gone outcomes for it are dropped until it is seen to exist
//! again (a settled check, or `note_present` from the event loop).

use crate::debounce::Burst;
use crate::dispatch::CallbackDispatcher;
use crate::event::CallbackEvent;
use crate::signal::StopSignal;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::debug;

/// Result of polling a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Stat succeeded and the path could be opened
    Settled,
    /// Stat failed
    Gone,
    /// Exists but cannot be opened yet (held by another process)
    Busy,
}

/// Stat the path, then try to open it for reading
///
/// Directories are settled as soon as they stat.
pub async fn probe(path: &Path) -> Stability {
    match tokio::fs::metadata(path).await {
        Err(_) => return Stability::Gone,
        Ok(meta) if meta.is_dir() => return Stability::Settled,
        Ok(_) => {}
    }
    match tokio::fs::File::open(path).await {
        // Handle closes on drop
        Ok(_file) => Stability::Settled,
        Err(_) => Stability::Busy,
    }
}

/// Membership in the in-flight table; leaving it releases the path
pub struct InFlightGuard {
    table: Arc<DashMap<PathBuf, ()>>,
    path: PathBuf,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.table.remove(&self.path);
    }
}

/// Single-flight stability checker
pub struct PathProcessor {
    in_flight: Arc<DashMap<PathBuf, ()>>,
    gone_reported: DashMap<PathBuf, ()>,
    permits: Arc<Semaphore>,
    poll_interval: Duration,
    dispatcher: Arc<CallbackDispatcher>,
    stop: StopSignal,
}

impl PathProcessor {
    pub fn new(
        poll_interval: Duration,
        max_concurrent_checks: usize,
        dispatcher: Arc<CallbackDispatcher>,
        stop: StopSignal,
    ) -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
            gone_reported: DashMap::new(),
            permits: Arc::new(Semaphore::new(max_concurrent_checks.max(1))),
            poll_interval,
            dispatcher,
            stop,
        }
    }

    /// Claim `path` for a check; None if a check is already in flight
    pub fn try_begin(&self, path: &Path) -> Option<InFlightGuard> {
        match self.in_flight.entry(path.to_path_buf()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(InFlightGuard {
                    table: self.in_flight.clone(),
                    path: path.to_path_buf(),
                })
            }
        }
    }

    pub fn is_in_flight(&self, path: &Path) -> bool {
        self.in_flight.contains_key(path)
    }

    /// Number of paths with a check in flight
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// The path was observed to exist; a later disappearance is reported again
    pub fn note_present(&self, path: &Path) {
        self.gone_reported.remove(path);
    }

    /// Whether the last outcome reported for `path` was gone
    pub fn is_gone_reported(&self, path: &Path) -> bool {
        self.gone_reported.contains_key(path)
    }

    /// Run a stability check for `path` and dispatch the outcome
    ///
    /// Returns the emitted event, or None when the signal was dropped
    /// (check already in flight, or the path's disappearance was already
    /// reported) or the run stopped mid-check.
    pub async fn handle(&self, path: PathBuf) -> Option<CallbackEvent> {
        let Some(guard) = self.try_begin(&path) else {
            debug!("Check already in flight, skipping: {}", path.display());
            return None;
        };

        let event = self.check_until_stable(&path).await;
        drop(guard);

        let event = event?;
        if event.exists {
            self.note_present(&event.path);
        } else if self.gone_reported.insert(event.path.clone(), ()).is_some() {
            debug!("Already reported gone, skipping: {}", event.path.display());
            return None;
        }
        debug!("Path {}: exists={}", event.path.display(), event.exists);
        self.dispatcher.dispatch(event.clone());
        Some(event)
    }

    async fn check_until_stable(&self, path: &Path) -> Option<CallbackEvent> {
        let _permit = tokio::select! {
            permit = self.permits.acquire() => permit.ok()?,
            _ = self.stop.triggered() => return None,
        };

        debug!("Checking {}", path.display());
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = self.stop.triggered() => {
                    debug!("Stopped while checking {}", path.display());
                    return None;
                }
            }

            match probe(path).await {
                Stability::Gone => return Some(CallbackEvent::gone(path)),
                Stability::Settled => return Some(CallbackEvent::settled(path)),
                Stability::Busy => debug!("Still busy: {}", path.display()),
            }
        }
    }

    /// Spawn a check for every event of every burst until the stream ends
    pub async fn consume(self: Arc<Self>, mut bursts: mpsc::UnboundedReceiver<Burst>) {
        while let Some(burst) = bursts.recv().await {
            for event in burst {
                debug!("Received {} for {}", event.op, event.path.display());
                let processor = self.clone();
                tokio::spawn(async move {
                    processor.handle(event.path).await;
                });
            }
        }
        debug!("Burst stream closed");
    }
}
