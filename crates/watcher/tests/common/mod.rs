//! Shared fixtures for pipeline tests

#![allow(dead_code)]

use parking_lot::Mutex;
use settle_watcher::{
    backend_channels, BackendSinks, BackendStreams, CallbackEvent, Op, RawEvent, Result,
    WatchBackend, WatcherConfig, WatcherError,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// In-memory backend: tracks watches and lets tests inject raw events
pub struct MemoryBackend {
    active: Mutex<HashSet<PathBuf>>,
    adds: Mutex<Vec<PathBuf>>,
    sinks: BackendSinks,
}

impl MemoryBackend {
    pub fn new() -> (Arc<Self>, BackendStreams) {
        let (sinks, streams) = backend_channels();
        let backend = Arc::new(Self {
            active: Mutex::new(HashSet::new()),
            adds: Mutex::new(Vec::new()),
            sinks,
        });
        (backend, streams)
    }

    /// Inject a raw event; false once the event loop has gone away
    pub fn emit(&self, path: impl Into<PathBuf>, op: Op) -> bool {
        self.sinks.events.send(RawEvent::new(path, op)).is_ok()
    }

    pub fn emit_error(&self, message: &str) -> bool {
        self.sinks
            .errors
            .send(WatcherError::Backend(notify::Error::generic(message)))
            .is_ok()
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.active.lock().contains(path)
    }

    /// How many times `path` was added
    pub fn add_count(&self, path: &Path) -> usize {
        self.adds.lock().iter().filter(|p| p.as_path() == path).count()
    }

    pub fn total_adds(&self) -> usize {
        self.adds.lock().len()
    }
}

impl WatchBackend for MemoryBackend {
    fn add_watch(&self, path: &Path) -> Result<()> {
        self.adds.lock().push(path.to_path_buf());
        self.active.lock().insert(path.to_path_buf());
        Ok(())
    }

    fn remove_watch(&self, path: &Path) -> Result<()> {
        if self.active.lock().remove(path) {
            Ok(())
        } else {
            Err(WatcherError::WatchNotFound(path.to_path_buf()))
        }
    }
}

/// Observer that records every callback and forwards it on a channel
pub struct Recorder {
    pub events: Arc<Mutex<Vec<CallbackEvent>>>,
    rx: mpsc::UnboundedReceiver<CallbackEvent>,
}

impl Recorder {
    pub fn new() -> (Self, Arc<dyn settle_watcher::PathObserver>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = events.clone();
        let observer = move |event: &CallbackEvent| -> anyhow::Result<()> {
            sink.lock().push(event.clone());
            let _ = tx.send(event.clone());
            Ok(())
        };
        (Self { events, rx }, Arc::new(observer))
    }

    /// Wait for the next callback, failing the test after `timeout`
    pub async fn next(&mut self, timeout: Duration) -> CallbackEvent {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .expect("timed out waiting for callback")
            .expect("observer dropped")
    }

    /// Collect exactly `count` callbacks
    pub async fn take(&mut self, count: usize, timeout: Duration) -> Vec<CallbackEvent> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.next(timeout).await);
        }
        out
    }

    /// Assert nothing else arrives within `quiet`
    pub async fn assert_quiet(&mut self, quiet: Duration) {
        if let Ok(Some(event)) = tokio::time::timeout(quiet, self.rx.recv()).await {
            panic!("unexpected callback: {:?}", event);
        }
    }
}

/// Short timings so tests finish quickly
pub fn fast_config() -> WatcherConfig {
    WatcherConfig {
        poll_interval_ms: 20,
        batch_refresh_delay_ms: 300,
        buffer_window_ms: 50,
        buffer_capacity: 5,
        max_concurrent_checks: 16,
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
