//! Debounced, stability-checked directory watching
//!
//! This crate watches one or more directory roots and reports each
//! real-world change exactly once as a `{path, exists}` callback:
//! - Every directory is watched individually (non-recursive backend)
//! - New subdirectories are picked up by a batched refresh after a quiet period
//! - File signals are buffered by a time-or-count window
//! - A per-path single-flight check waits until the path settles or disappears
//!
//! All state lives in a [`Watcher`] value, so independent watchers can
//! coexist in one process.

pub mod config;
pub mod debounce;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod pending;
pub mod platform;
pub mod processor;
pub mod router;
pub mod scheduler;
pub mod signal;
pub mod watchset;

pub use config::WatcherConfig;
pub use dispatch::{CallbackDispatcher, PathObserver};
pub use error::{Result, WatcherError};
pub use event::{CallbackEvent, FileChangeEvent, Op, RawEvent};
pub use platform::{backend_channels, BackendSinks, BackendStreams, NotifyBackend, WatchBackend};

use debounce::DebounceCoalescer;
use pending::PendingPathSet;
use processor::PathProcessor;
use router::RawEventRouter;
use scheduler::DelayedTaskScheduler;
use signal::StopSignal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use watchset::WatchSetManager;

/// State of one started run
struct Run {
    stop: StopSignal,
    scheduler: Arc<DelayedTaskScheduler>,
    coalescer: Arc<DebounceCoalescer>,
    watch_set: Arc<WatchSetManager>,
    router: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

/// Directory watcher owning the whole pipeline
pub struct Watcher {
    config: WatcherConfig,
    dispatcher: Arc<CallbackDispatcher>,
    /// Held across start/stop so they never interleave
    run: Mutex<Option<Run>>,
}

impl Watcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            dispatcher: Arc::new(CallbackDispatcher::new()),
            run: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Register the observer that receives every terminal notification
    pub fn set_path_callback_listener(&self, observer: Arc<dyn PathObserver>) {
        self.dispatcher.set_observer(observer);
    }

    /// Start watching `roots` with the platform's native backend
    ///
    /// A running watcher is stopped first. Fails if the backend cannot be
    /// constructed.
    pub async fn start(&self, roots: &[PathBuf]) -> Result<()> {
        let (backend, streams) = NotifyBackend::new()?;
        self.start_with_backend(roots, Arc::new(backend), streams)
            .await
    }

    /// Start watching `roots` through the given backend
    pub async fn start_with_backend(
        &self,
        roots: &[PathBuf],
        backend: Arc<dyn WatchBackend>,
        streams: BackendStreams,
    ) -> Result<()> {
        self.config.validate()?;

        let mut run = self.run.lock().await;
        if let Some(previous) = run.take() {
            info!("Restarting watcher; stopping previous run");
            shutdown(previous).await;
        }

        let stop = StopSignal::new();
        let watch_set = Arc::new(WatchSetManager::new(backend));
        let pending = Arc::new(PendingPathSet::new());
        let scheduler = Arc::new(DelayedTaskScheduler::new());
        scheduler.start();

        let coalescer = Arc::new(DebounceCoalescer::new(
            self.config.buffer_window(),
            self.config.buffer_capacity,
        ));
        let bursts = coalescer.restart();

        let initial = watch_set.clone();
        let initial_roots = roots.to_vec();
        if let Err(e) =
            tokio::task::spawn_blocking(move || initial.refresh(&initial_roots)).await
        {
            warn!("Initial traversal failed: {}", e);
        }

        let processor = Arc::new(PathProcessor::new(
            self.config.poll_interval(),
            self.config.max_concurrent_checks,
            self.dispatcher.clone(),
            stop.clone(),
        ));
        let consumer = tokio::spawn(processor.clone().consume(bursts));

        let router = RawEventRouter::new(
            watch_set.clone(),
            pending,
            scheduler.clone(),
            coalescer.clone(),
            processor,
            self.config.batch_refresh_delay(),
        );
        let router = tokio::spawn(router.run(streams.events, streams.errors, stop.clone()));

        info!("Watching {} root(s)", roots.len());
        *run = Some(Run {
            stop,
            scheduler,
            coalescer,
            watch_set,
            router,
            consumer,
        });
        Ok(())
    }

    /// Stop the running pipeline and wait for its loops to exit
    ///
    /// In-flight stability checks end without emitting. Observer calls
    /// already dispatched finish on their own and are not awaited.
    pub async fn graceful_stop(&self) {
        let mut run = self.run.lock().await;
        match run.take() {
            Some(current) => shutdown(current).await,
            None => info!("Watcher not running"),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.run.lock().await.is_some()
    }

    /// Directories currently carrying a watch (empty when stopped)
    pub async fn watched_paths(&self) -> Vec<PathBuf> {
        match self.run.lock().await.as_ref() {
            Some(run) => run.watch_set.watched_paths(),
            None => Vec::new(),
        }
    }
}

impl Default for Watcher {
    fn default() -> Self {
        Self::new(WatcherConfig::default())
    }
}

async fn shutdown(run: Run) {
    run.stop.trigger();
    run.scheduler.shutdown();
    run.coalescer.close();

    if let Err(e) = run.router.await {
        warn!("Event loop ended abnormally: {}", e);
    }
    if let Err(e) = run.consumer.await {
        warn!("Burst consumer ended abnormally: {}", e);
    }
    info!("Watcher stopped");
}
