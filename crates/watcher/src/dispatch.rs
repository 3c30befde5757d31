//! Delivery of terminal notifications to the registered observer

use crate::event::CallbackEvent;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Receives settled/gone notifications
pub trait PathObserver: Send + Sync + 'static {
    fn on_path_changed(&self, event: &CallbackEvent) -> anyhow::Result<()>;
}

impl<F> PathObserver for F
where
    F: Fn(&CallbackEvent) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn on_path_changed(&self, event: &CallbackEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Holds at most one observer and shields the pipeline from it
///
/// Observers run on the blocking pool, so a slow observer never stalls
/// the event loop. Errors and panics are logged and swallowed.
#[derive(Default)]
pub struct CallbackDispatcher {
    observer: RwLock<Option<Arc<dyn PathObserver>>>,
}

impl CallbackDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the observer, replacing any previous one
    pub fn set_observer(&self, observer: Arc<dyn PathObserver>) {
        *self.observer.write() = Some(observer);
    }

    pub fn clear_observer(&self) {
        *self.observer.write() = None;
    }

    pub fn has_observer(&self) -> bool {
        self.observer.read().is_some()
    }

    /// Deliver `event` without waiting for the observer
    ///
    /// Returns the handle of the delivery task, or None when no observer
    /// is registered.
    pub fn dispatch(&self, event: CallbackEvent) -> Option<JoinHandle<()>> {
        let Some(observer) = self.observer.read().clone() else {
            debug!("No observer registered; dropping {:?}", event);
            return None;
        };

        Some(tokio::spawn(deliver(observer, event)))
    }
}

async fn deliver(observer: Arc<dyn PathObserver>, event: CallbackEvent) {
    let path = event.path.clone();
    let result = tokio::task::spawn_blocking(move || observer.on_path_changed(&event)).await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Observer failed for {}: {:#}", path.display(), e),
        Err(join_err) if join_err.is_panic() => {
            error!("Observer panicked for {}", path.display())
        }
        Err(join_err) => warn!("Observer task aborted for {}: {}", path.display(), join_err),
    }
}
