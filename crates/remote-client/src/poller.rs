//! Poller — status requests and the action-id bookkeeping around them.
//!
//! The server numbers every action change set.  The client sends the id of
//! the last set it applied; when the server answers with a different id the
//! attached set is applied and the id advances.  If applying fails the id is
//! left alone, so the next poll asks for the same set again.  A transport
//! failure resets the id to `RESYNC_ACTION_ID` so the first successful poll
//! after a reconnect carries the full action state.

use std::sync::Arc;

use remote_proto::protocol::{ActionChanges, StatusResponse, RESYNC_ACTION_ID};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::{ApplyError, TransportError};
use crate::transport::{cancellable, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTracker {
    last_id: i64,
}

/// What happened to the change set carried by one status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconcile {
    /// Server id equals ours; nothing was applied.
    Unchanged,
    /// Set applied, id advanced.
    Applied { from: i64, to: i64, changed: usize },
    /// Applying failed; id kept so the set is re-delivered.
    Deferred(ApplyError),
}

impl Default for ActionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionTracker {
    pub fn new() -> Self {
        Self {
            last_id: RESYNC_ACTION_ID,
        }
    }

    pub fn last_id(&self) -> i64 {
        self.last_id
    }

    /// Force the next poll to fetch the full action state.
    pub fn reset(&mut self) {
        self.last_id = RESYNC_ACTION_ID;
    }

    pub fn reconcile(
        &mut self,
        changes: &ActionChanges,
        apply: impl FnOnce(&Map<String, Value>) -> Result<usize, ApplyError>,
    ) -> Reconcile {
        if changes.id == self.last_id {
            return Reconcile::Unchanged;
        }
        match apply(&changes.changes) {
            Ok(changed) => {
                let from = self.last_id;
                self.last_id = changes.id;
                Reconcile::Applied {
                    from,
                    to: changes.id,
                    changed,
                }
            }
            Err(e) => Reconcile::Deferred(e),
        }
    }
}

pub struct Poller<T> {
    transport: Arc<T>,
}

impl<T> Clone for Poller<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> Poller<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// One status request carrying `action_id`.
    pub async fn fetch(
        &self,
        action_id: i64,
        cancel: &CancellationToken,
    ) -> Result<StatusResponse, TransportError> {
        cancellable(cancel, self.transport.status(action_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(id: i64) -> ActionChanges {
        ActionChanges {
            id,
            changes: json!({"actionShow_Stars": true})
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    #[test]
    fn test_starts_at_resync_sentinel() {
        assert_eq!(ActionTracker::new().last_id(), RESYNC_ACTION_ID);
    }

    #[test]
    fn test_same_id_skips_application() {
        let mut tracker = ActionTracker::new();
        tracker.reconcile(&set(5), |_| Ok(1));
        assert_eq!(tracker.last_id(), 5);

        let mut called = false;
        let outcome = tracker.reconcile(&set(5), |_| {
            called = true;
            Ok(0)
        });
        assert_eq!(outcome, Reconcile::Unchanged);
        assert!(!called);
        assert_eq!(tracker.last_id(), 5);
    }

    #[test]
    fn test_new_id_advances_after_apply() {
        let mut tracker = ActionTracker::new();
        let outcome = tracker.reconcile(&set(9), |changes| {
            assert_eq!(changes.len(), 1);
            Ok(1)
        });
        assert_eq!(
            outcome,
            Reconcile::Applied {
                from: RESYNC_ACTION_ID,
                to: 9,
                changed: 1
            }
        );
        assert_eq!(tracker.last_id(), 9);
    }

    #[test]
    fn test_failed_apply_keeps_id() {
        let mut tracker = ActionTracker::new();
        tracker.reconcile(&set(3), |_| Ok(0));
        let outcome = tracker.reconcile(&set(4), |_| Err(ApplyError::NotLoaded));
        assert_eq!(outcome, Reconcile::Deferred(ApplyError::NotLoaded));
        assert_eq!(tracker.last_id(), 3);
    }

    #[test]
    fn test_reset_forces_resync() {
        let mut tracker = ActionTracker::new();
        tracker.reconcile(&set(12), |_| Ok(0));
        tracker.reset();
        assert_eq!(tracker.last_id(), RESYNC_ACTION_ID);
    }
}
