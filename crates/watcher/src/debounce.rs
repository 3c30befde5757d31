//! Time-or-count buffering of file change signals
//!
//! Throttles how fast stability checks get spawned:
//! - A burst opens with the first buffered item
//! - It is released after the window elapses or the count bound is hit
//! - Items are released individually; repeated signals for one path are
//!   not merged (the processor's single-flight guard handles that)

use crate::event::FileChangeEvent;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

/// One released batch of buffered events
pub type Burst = Vec<FileChangeEvent>;

/// Buffers change signals into bursts
pub struct DebounceCoalescer {
    window: Duration,
    capacity: usize,
    /// Input side of the current buffering stream, if one is open
    input: Mutex<Option<mpsc::UnboundedSender<FileChangeEvent>>>,
}

impl DebounceCoalescer {
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            window,
            capacity: capacity.max(1),
            input: Mutex::new(None),
        }
    }

    /// Open a fresh buffering stream, closing any previous one
    ///
    /// Returns the receiver of released bursts. A closed stream flushes
    /// whatever it still buffers before its burst receiver ends.
    pub fn restart(&self) -> mpsc::UnboundedReceiver<Burst> {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (burst_tx, burst_rx) = mpsc::unbounded_channel();

        {
            let mut input = self.input.lock();
            if input.replace(input_tx).is_some() {
                debug!("Closed previous buffering stream");
            }
        }

        tokio::spawn(buffer_loop(input_rx, burst_tx, self.window, self.capacity));
        burst_rx
    }

    /// Feed one event into the current stream
    ///
    /// Returns false if no stream is open and the event was dropped.
    pub fn send(&self, event: FileChangeEvent) -> bool {
        let input = self.input.lock();
        match input.as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => {
                debug!("No buffering stream open; dropping {}", event.path.display());
                false
            }
        }
    }

    /// Close the current stream (idempotent)
    pub fn close(&self) {
        if self.input.lock().take().is_some() {
            debug!("Closed buffering stream");
        }
    }

    pub fn is_open(&self) -> bool {
        self.input.lock().is_some()
    }
}

async fn buffer_loop(
    mut input: mpsc::UnboundedReceiver<FileChangeEvent>,
    output: mpsc::UnboundedSender<Burst>,
    window: Duration,
    capacity: usize,
) {
    loop {
        let Some(first) = input.recv().await else {
            return;
        };

        let mut burst = Vec::with_capacity(capacity);
        burst.push(first);
        let deadline = Instant::now() + window;
        let mut closed = false;

        while burst.len() < capacity {
            match timeout_at(deadline, input.recv()).await {
                Ok(Some(event)) => burst.push(event),
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }

        debug!("Releasing burst of {} events", burst.len());
        if output.send(burst).is_err() || closed {
            return;
        }
    }
}
