//! AppState — shared read-only data passed to all components during render/event.
//!
//! Components read this but never mutate it.  The App event loop is the only
//! writer, fed by `PanelEvent`s from the controller.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use remote_client::PanelEvent;
use remote_proto::protocol::{ActionList, LocationStatus, StatusResponse};

use crate::widgets::status_bar::InputMode;

pub struct AppState {
    pub status: Option<Arc<StatusResponse>>,
    /// When `status` arrived; simulation time is extrapolated from here.
    pub status_at: Instant,
    /// Time of the current animation frame.
    pub now: Instant,
    pub actions: Arc<ActionList>,
    pub locations: Arc<Vec<String>>,
    pub connected: bool,
    pub disconnected_secs: u64,
    pub busy: bool,
    /// Paths with an edit waiting in its debounce queue.
    pub pending_edits: HashSet<String>,
    pub last_log: Option<String>,
    pub input_mode: InputMode,
}

impl AppState {
    pub fn new(now: Instant) -> Self {
        Self {
            status: None,
            status_at: now,
            now,
            actions: Arc::new(ActionList::new()),
            locations: Arc::new(Vec::new()),
            connected: true,
            disconnected_secs: 0,
            busy: false,
            pending_edits: HashSet::new(),
            last_log: None,
            input_mode: InputMode::Normal,
        }
    }

    /// Store a controller event.  Returns `false` for events that carry no
    /// state (alerts).
    pub fn apply(&mut self, event: &PanelEvent, now: Instant) -> bool {
        match event {
            PanelEvent::Status(status) => {
                self.status = Some(Arc::clone(status));
                self.status_at = now;
                self.now = now;
                // Statuses only arrive over a working connection, so a
                // restore lost to receiver lag is recovered here.
                self.connected = true;
            }
            PanelEvent::Actions(actions) => self.actions = Arc::clone(actions),
            PanelEvent::Locations(locations) => self.locations = Arc::clone(locations),
            PanelEvent::ConnectionLost => {
                self.connected = false;
            }
            PanelEvent::ConnectionRestored => {
                self.connected = true;
                self.disconnected_secs = 0;
            }
            PanelEvent::Disconnected { secs } => {
                self.connected = false;
                self.disconnected_secs = *secs;
            }
            PanelEvent::Busy(busy) => self.busy = *busy,
            PanelEvent::EditFlushed { path } => {
                self.pending_edits.remove(path);
            }
            PanelEvent::Alert(_) => return false,
        }
        true
    }

    /// Simulation time at `now`, extrapolated from the last status.
    pub fn displayed_jday(&self) -> Option<f64> {
        let status = self.status.as_ref()?;
        let elapsed = self.now.saturating_duration_since(self.status_at);
        Some(status.time.extrapolated_jday(elapsed))
    }

    pub fn location(&self) -> Option<&LocationStatus> {
        self.status.as_ref().map(|s| &s.location)
    }
}

/// Entry of the server location list that corresponds to `location`.
pub fn location_id(location: &LocationStatus) -> String {
    if location.region.is_empty() {
        location.name.clone()
    } else {
        format!("{}, {}", location.name, location.region)
    }
}
