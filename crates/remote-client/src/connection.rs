//! ConnectionMonitor — Connected/Disconnected state driven by poll results.
//!
//! ```text
//!  Connected ──poll transport failure──▶ Disconnected
//!      ▲                                      │
//!      └────────────poll success──────────────┘
//! ```
//!
//! Transitions are reported exactly once, so the caller opens the blocking
//! "no response" modal on `Lost` and closes it on `Restored` without ever
//! opening it twice.

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Lost,
    Restored,
}

#[derive(Debug, Clone)]
pub struct ConnectionMonitor {
    connection_lost: bool,
    /// When the last successful status arrived.  Starts at construction so
    /// the counter is meaningful even if the very first poll fails.
    last_data_at: Instant,
}

impl ConnectionMonitor {
    pub fn new(now: Instant) -> Self {
        Self {
            connection_lost: false,
            last_data_at: now,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.connection_lost {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Connected
        }
    }

    pub fn is_lost(&self) -> bool {
        self.connection_lost
    }

    pub fn last_data_at(&self) -> Instant {
        self.last_data_at
    }

    /// A poll succeeded at `now`.
    pub fn on_success(&mut self, now: Instant) -> Option<Transition> {
        self.last_data_at = now;
        if self.connection_lost {
            self.connection_lost = false;
            Some(Transition::Restored)
        } else {
            None
        }
    }

    /// A poll failed at the transport level.
    pub fn on_failure(&mut self) -> Option<Transition> {
        if self.connection_lost {
            None
        } else {
            self.connection_lost = true;
            Some(Transition::Lost)
        }
    }

    /// Whole seconds since the last data, only while disconnected.
    pub fn disconnected_secs(&self, now: Instant) -> Option<u64> {
        self.connection_lost
            .then(|| now.saturating_duration_since(self.last_data_at).as_secs())
    }
}
