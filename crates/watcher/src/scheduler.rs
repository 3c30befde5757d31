//! Cancelable delayed-task scheduler
//!
//! Used to batch bursts of directory creation: every new Create cancels
//! the outstanding refresh and schedules a fresh one, so only the last
//! quiet period counts.
//!
//! Each scheduled task gets its own timer. A task runs at most once, and
//! only if it is still pending when its timer elapses. Cancellation that
//! races with the timer may lose; either way the work never runs twice.

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

type Work = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

const PENDING: u8 = 0;
const CANCELED: u8 = 1;
const FIRED: u8 = 2;

/// Handle to a scheduled task
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    delay: Duration,
    state: Arc<AtomicU8>,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancel the task if it has not fired yet
    ///
    /// Returns true if this call canceled it.
    pub fn cancel(&self) -> bool {
        self.state
            .compare_exchange(PENDING, CANCELED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_canceled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELED
    }

    pub fn has_fired(&self) -> bool {
        self.state.load(Ordering::Acquire) == FIRED
    }

    fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    /// Claim the right to run; fails if canceled or already fired
    fn claim(&self) -> bool {
        self.state
            .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

struct Scheduled {
    handle: TaskHandle,
    work: Work,
}

struct State {
    tracked: Vec<TaskHandle>,
    next_id: u64,
    running: bool,
    shut_down: bool,
    rx: Option<mpsc::UnboundedReceiver<Scheduled>>,
    dispatch: Option<JoinHandle<()>>,
}

/// Holds and fires cancelable delayed work
pub struct DelayedTaskScheduler {
    state: Mutex<State>,
    tx: mpsc::UnboundedSender<Scheduled>,
}

impl DelayedTaskScheduler {
    pub fn new() -> Self {
        Self::with_next_id(0)
    }

    /// Create a scheduler whose first task gets `next_id`
    pub fn with_next_id(next_id: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(State {
                tracked: Vec::new(),
                next_id,
                running: false,
                shut_down: false,
                rx: Some(rx),
                dispatch: None,
            }),
            tx,
        }
    }

    /// Start the dispatch loop (idempotent)
    ///
    /// The first call cancels any task queued before the scheduler was
    /// running. Must be called from within a tokio runtime.
    pub fn start(&self) {
        let rx = {
            let mut state = self.state.lock();
            if state.running {
                return;
            }
            let Some(rx) = state.rx.take() else {
                debug!("Scheduler was shut down; not restarting");
                return;
            };
            state.running = true;
            cancel_tracked(&mut state.tracked);
            rx
        };

        let dispatch = tokio::spawn(dispatch_loop(rx));
        self.state.lock().dispatch = Some(dispatch);
    }

    /// Schedule `work` to run after `delay`
    pub fn add_task<F>(&self, delay: Duration, work: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.state.lock();

        let handle = TaskHandle {
            id: state.next_id,
            delay,
            state: Arc::new(AtomicU8::new(PENDING)),
        };
        state.next_id = state.next_id.wrapping_add(1);

        if state.shut_down {
            debug!("Scheduler is shut down; task {} dropped", handle.id);
            handle.cancel();
            return handle;
        }

        state.tracked.retain(TaskHandle::is_pending);
        state.tracked.push(handle.clone());

        // Publish while holding the lock so ids reach the loop in order
        if self
            .tx
            .send(Scheduled {
                handle: handle.clone(),
                work: Box::pin(work),
            })
            .is_err()
        {
            debug!("Scheduler dispatch loop is gone; task {} dropped", handle.id);
            handle.cancel();
        }

        handle
    }

    /// Cancel every tracked task and forget them
    pub fn cancel_all(&self) {
        let mut state = self.state.lock();
        cancel_tracked(&mut state.tracked);
    }

    /// Number of tasks still waiting to fire
    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .tracked
            .iter()
            .filter(|task| task.is_pending())
            .count()
    }

    /// Cancel everything and stop the dispatch loop for good
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        cancel_tracked(&mut state.tracked);
        state.shut_down = true;
        state.rx = None;
        state.running = false;
        if let Some(dispatch) = state.dispatch.take() {
            dispatch.abort();
        }
    }
}

impl Default for DelayedTaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn cancel_tracked(tracked: &mut Vec<TaskHandle>) {
    for task in tracked.drain(..) {
        if task.cancel() {
            debug!("Canceled delayed task {}", task.id);
        }
    }
}

async fn dispatch_loop(mut rx: mpsc::UnboundedReceiver<Scheduled>) {
    while let Some(scheduled) = rx.recv().await {
        debug!(
            "Scheduling task {} in {:?}",
            scheduled.handle.id, scheduled.handle.delay
        );
        tokio::spawn(fire(scheduled));
    }
}

async fn fire(scheduled: Scheduled) {
    let Scheduled { handle, work } = scheduled;
    tokio::time::sleep(handle.delay).await;

    if !handle.claim() {
        debug!("Task {} canceled before firing", handle.id);
        return;
    }

    debug!("Running task {}", handle.id);
    work.await;
    debug!("Task {} finished", handle.id);
}
