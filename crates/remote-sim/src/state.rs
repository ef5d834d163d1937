//! In-memory model of the controlled application.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use remote_proto::protocol::{
    utc_to_jday, ActionChanges, ActionInfo, ActionList, LocationStatus, ScriptStatus,
    StatusResponse, TimeStatus, ViewStatus, OK_REPLY,
};
use serde_json::{Map, Value};

/// Reply for a command whose parameters are missing or out of range.
pub const INVALID_PARAMETER: &str = "Invalid parameter";

/// One day in Julian days per real second.
const REAL_TIME_RATE: f64 = 1.0 / 86_400.0;

const MIN_FOV: f64 = 0.001;
const MAX_FOV: f64 = 360.0;

pub struct Simulation {
    actions: ActionList,
    /// Bumped on every action state change.
    action_revision: i64,
    locations: Vec<String>,
    location: LocationStatus,
    /// Simulation time at `clock_origin`.
    jday_origin: f64,
    clock_origin: Instant,
    timerate: f64,
    fov: f64,
    projection: String,
    selection: Option<String>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    pub fn new() -> Self {
        let mut actions = ActionList::new();
        actions.insert(
            "Display Options".into(),
            vec![
                toggle("actionShow_Stars", "Stars", true),
                toggle("actionShow_Planets", "Planets", true),
                toggle("actionShow_Constellation_Lines", "Constellation lines", false),
                toggle("actionShow_Atmosphere", "Atmosphere", true),
            ],
        );
        actions.insert(
            "Navigation".into(),
            vec![
                command("actionGoto_Selected_Object", "Center on selected object"),
                toggle("actionSet_Tracking", "Track object", false),
            ],
        );

        let locations: Vec<String> = [
            "Vienna, Austria",
            "Paris, France",
            "Greenwich, United Kingdom",
            "Mauna Kea, United States",
            "Siding Spring, Australia",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self {
            actions,
            action_revision: 0,
            location: location_named(&locations[0]),
            locations,
            jday_origin: utc_to_jday(Utc::now()),
            clock_origin: Instant::now(),
            timerate: REAL_TIME_RATE,
            fov: 60.0,
            projection: "ProjectionStereographic".into(),
            selection: Some("<h2>Sirius (α CMa)</h2>Type: <b>double star</b><br/>Magnitude: <b>-1.46</b>".into()),
        }
    }

    pub fn action_revision(&self) -> i64 {
        self.action_revision
    }

    pub fn actions(&self) -> &ActionList {
        &self.actions
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    fn jday(&self) -> f64 {
        self.jday_origin + self.timerate * self.clock_origin.elapsed().as_secs_f64()
    }

    /// Status as seen by a client whose last applied action change set is
    /// `action_id`.  Any other id receives the complete action state.
    pub fn status(&self, action_id: i64) -> StatusResponse {
        let mut changes = Map::new();
        if action_id != self.action_revision {
            for action in self.actions.values().flatten().filter(|a| a.is_checkable) {
                changes.insert(action.id.clone(), Value::Bool(action.is_checked));
            }
        }

        let jday = self.jday();
        StatusResponse {
            selection_info: self.selection.clone(),
            time: TimeStatus {
                jday,
                delta_t: 0.0008,
                gmt_shift: 0.0,
                time_zone: "UTC".into(),
                timerate: self.timerate,
                is_time_now: (self.timerate - REAL_TIME_RATE).abs() < f64::EPSILON
                    && (jday - utc_to_jday(Utc::now())).abs() < 1.0 / 86_400.0,
            },
            script: ScriptStatus::default(),
            location: self.location.clone(),
            view: ViewStatus {
                fov: self.fov,
                projection: self.projection.clone(),
            },
            action_changes: ActionChanges {
                id: self.action_revision,
                changes,
            },
        }
    }

    /// Trigger an action.  Checkable actions toggle.
    pub fn trigger(&mut self, id: &str) -> String {
        let Some(action) = self.actions.values_mut().flatten().find(|a| a.id == id) else {
            return format!("Unknown action: {}", id);
        };
        if action.is_checkable {
            action.is_checked = !action.is_checked;
            self.action_revision += 1;
        }
        OK_REPLY.to_string()
    }

    pub fn set_fov(&mut self, fov: Option<&str>) -> String {
        match fov.and_then(|f| f.parse::<f64>().ok()) {
            Some(fov) if (MIN_FOV..=MAX_FOV).contains(&fov) => {
                self.fov = fov;
                OK_REPLY.to_string()
            }
            _ => INVALID_PARAMETER.to_string(),
        }
    }

    /// Set simulation time and/or rate.  Both fields are optional but at
    /// least one must be valid.
    pub fn set_time(&mut self, time: Option<&str>, timerate: Option<&str>) -> String {
        let time = match time.map(str::parse::<f64>) {
            Some(Ok(t)) if t.is_finite() => Some(t),
            Some(_) => return INVALID_PARAMETER.to_string(),
            None => None,
        };
        let timerate = match timerate.map(str::parse::<f64>) {
            Some(Ok(r)) if r.is_finite() => Some(r),
            Some(_) => return INVALID_PARAMETER.to_string(),
            None => None,
        };
        if time.is_none() && timerate.is_none() {
            return INVALID_PARAMETER.to_string();
        }

        // Re-anchor so the new rate only applies from now on.
        self.jday_origin = time.unwrap_or_else(|| self.jday());
        self.clock_origin = Instant::now();
        if let Some(rate) = timerate {
            self.timerate = rate;
        }
        OK_REPLY.to_string()
    }

    pub fn set_location(&mut self, name: Option<&str>) -> String {
        match name {
            Some(name) if self.locations.iter().any(|l| l == name) => {
                self.location = location_named(name);
                OK_REPLY.to_string()
            }
            Some(name) => format!("Location not found: {}", name),
            None => INVALID_PARAMETER.to_string(),
        }
    }
}

fn toggle(id: &str, text: &str, checked: bool) -> ActionInfo {
    ActionInfo {
        id: id.into(),
        text: text.into(),
        is_checkable: true,
        is_checked: checked,
    }
}

fn command(id: &str, text: &str) -> ActionInfo {
    ActionInfo {
        id: id.into(),
        text: text.into(),
        is_checkable: false,
        is_checked: false,
    }
}

fn location_named(name: &str) -> LocationStatus {
    let known: BTreeMap<&str, (f64, f64, i32)> = [
        ("Vienna, Austria", (48.21, 16.37, 170)),
        ("Paris, France", (48.85, 2.35, 35)),
        ("Greenwich, United Kingdom", (51.48, 0.0, 46)),
        ("Mauna Kea, United States", (19.82, -155.47, 4205)),
        ("Siding Spring, Australia", (-31.27, 149.06, 1165)),
    ]
    .into_iter()
    .collect();
    let (latitude, longitude, altitude) = known.get(name).copied().unwrap_or_default();
    let (city, region) = name.split_once(", ").unwrap_or((name, ""));
    LocationStatus {
        name: city.into(),
        role: "X".into(),
        planet: "Earth".into(),
        latitude,
        longitude,
        altitude,
        region: region.into(),
        landscape_key: "guereins".into(),
    }
}
