use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Action id sent before any change set has been applied.  The server never
/// uses it as a change id, so a poll carrying it always receives the full
/// action state.
pub const RESYNC_ACTION_ID: i64 = -2;

/// Response body the server uses to acknowledge a command.
pub const OK_REPLY: &str = "ok";

/// Julian day of the Unix epoch (1970-01-01T00:00:00Z).
const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// HTTP paths of the remote control API.
pub mod paths {
    pub const STATUS: &str = "/api/main/status";
    pub const FOV: &str = "/api/main/fov";
    pub const TIME: &str = "/api/main/time";
    pub const ACTION_LIST: &str = "/api/stelaction/list";
    pub const ACTION_DO: &str = "/api/stelaction/do";
    pub const LOCATION_LIST: &str = "/api/location/list";
    pub const LOCATION_SET: &str = "/api/location/setlocationfields";
}

/// Body of `GET /api/main/status`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// HTML fragment describing the current selection; absent or empty when
    /// nothing is selected.
    #[serde(default, rename = "selectioninfo")]
    pub selection_info: Option<String>,
    #[serde(default)]
    pub time: TimeStatus,
    #[serde(default)]
    pub script: ScriptStatus,
    #[serde(default)]
    pub location: LocationStatus,
    #[serde(default)]
    pub view: ViewStatus,
    #[serde(default)]
    pub action_changes: ActionChanges,
}

impl StatusResponse {
    /// Selection text, `None` when empty.
    pub fn selection(&self) -> Option<&str> {
        self.selection_info
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeStatus {
    /// Simulation time as a Julian day (UT).
    pub jday: f64,
    pub delta_t: f64,
    /// Offset of the location time zone from UT, in days.
    pub gmt_shift: f64,
    pub time_zone: String,
    /// Simulation speed in Julian days per real second.
    pub timerate: f64,
    pub is_time_now: bool,
}

impl TimeStatus {
    /// The Julian day the server is expected to be at `elapsed` after this
    /// status was received.
    pub fn extrapolated_jday(&self, elapsed: Duration) -> f64 {
        self.jday + self.timerate * elapsed.as_secs_f64()
    }

    /// Speed factor relative to real time (1.0 = real time).
    pub fn speed_factor(&self) -> f64 {
        self.timerate * SECONDS_PER_DAY
    }
}

/// Convert a Julian day to a UTC timestamp.  Returns `None` for values
/// outside chrono's representable range.
pub fn jday_to_utc(jday: f64) -> Option<DateTime<Utc>> {
    if !jday.is_finite() {
        return None;
    }
    let secs = (jday - UNIX_EPOCH_JD) * SECONDS_PER_DAY;
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::<Utc>::from_timestamp(whole as i64, nanos)
}

/// Convert a UTC timestamp to a Julian day.
pub fn utc_to_jday(time: DateTime<Utc>) -> f64 {
    let secs = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) / 1e9;
    UNIX_EPOCH_JD + secs / SECONDS_PER_DAY
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptStatus {
    pub script_is_running: bool,
    pub running_script_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationStatus {
    pub name: String,
    pub role: String,
    pub planet: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: i32,
    pub region: String,
    pub landscape_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewStatus {
    /// Field of view in degrees.
    pub fov: f64,
    pub projection: String,
}

/// Server-pushed action state.  `changes` maps action id to its new checked
/// state and is only meaningful when `id` differs from the id the client
/// sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionChanges {
    pub id: i64,
    #[serde(default)]
    pub changes: serde_json::Map<String, serde_json::Value>,
}

impl Default for ActionChanges {
    fn default() -> Self {
        Self {
            id: RESYNC_ACTION_ID,
            changes: serde_json::Map::new(),
        }
    }
}

/// One server-side action as listed by `GET /api/stelaction/list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionInfo {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub is_checkable: bool,
    #[serde(default)]
    pub is_checked: bool,
}

/// Actions grouped by their group name.
pub type ActionList = BTreeMap<String, Vec<ActionInfo>>;

/// Ordered form fields of a command POST.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
#[serde(transparent)]
pub struct Payload(Vec<(String, String)>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.push((key.into(), value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Interpretation of a command response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    Ok,
    /// The request reached the server but it refused the command; the body
    /// is a human-readable reason.
    Rejected(String),
}

impl CommandReply {
    pub fn from_body(body: &str) -> Self {
        if body == OK_REPLY {
            Self::Ok
        } else {
            Self::Rejected(body.to_string())
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}
