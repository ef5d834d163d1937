//! Load indicator — counts in-flight requests and decides when the busy
//! spinner should be visible.
//!
//! Requests hold a `LoadGuard` for their lifetime.  The controller watches
//! the counter and feeds it to `Spinner`, which only reports "busy" once a
//! request has been outstanding for the configured delay, so fast requests
//! never flash the spinner.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Clone)]
pub struct LoadIndicator {
    in_flight: Arc<watch::Sender<usize>>,
}

impl LoadIndicator {
    pub fn new() -> (Self, watch::Receiver<usize>) {
        let (tx, rx) = watch::channel(0usize);
        (
            Self {
                in_flight: Arc::new(tx),
            },
            rx,
        )
    }

    /// Mark one request as started; it ends when the guard drops.
    pub fn begin(&self) -> LoadGuard {
        self.in_flight.send_modify(|n| *n += 1);
        LoadGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }
}

pub struct LoadGuard {
    in_flight: Arc<watch::Sender<usize>>,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[derive(Debug)]
pub struct Spinner {
    delay: Duration,
    deadline: Option<Instant>,
    shown: bool,
}

impl Spinner {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            shown: false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_shown(&self) -> bool {
        self.shown
    }

    /// The in-flight count changed.  Returns `Some(false)` when the spinner
    /// must be hidden.
    pub fn on_in_flight(&mut self, in_flight: usize, now: Instant) -> Option<bool> {
        if in_flight > 0 {
            if self.deadline.is_none() && !self.shown {
                self.deadline = Some(now + self.delay);
            }
            None
        } else {
            self.deadline = None;
            if self.shown {
                self.shown = false;
                Some(false)
            } else {
                None
            }
        }
    }

    /// The delay elapsed.  Returns `Some(true)` when the spinner must be
    /// shown.
    pub fn on_deadline(&mut self, in_flight: usize) -> Option<bool> {
        self.deadline = None;
        if in_flight > 0 && !self.shown {
            self.shown = true;
            Some(true)
        } else {
            None
        }
    }
}
