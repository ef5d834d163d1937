//! ViewPanel — field of view and simulation speed controls.
//!
//! Field of view and time rate changes go through the debounced edit queues.
//! The locally chosen value is shown until the server reports it back, so
//! repeated key presses keep stepping from what the user sees.

use chrono::Utc;
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use remote_client::PanelEvent;
use remote_proto::protocol::{paths, utc_to_jday, Payload};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    components::main_panel::format_speed,
    theme::{style_bold, style_default, style_muted, style_secondary, C_PENDING},
    widgets::pane_chrome::{pane_chrome, Badge},
};

/// Julian days per real second at real-time speed.
pub const REAL_TIME_RATE: f64 = 1.0 / 86_400.0;
const RATE_STEP: f64 = 10.0;

pub const MIN_FOV: f64 = 0.001;
pub const MAX_FOV: f64 = 360.0;
const FOV_STEP: f64 = 1.25;

/// One step up the speed ladder: …, -10×, -1×, paused, 1×, 10×, …
pub fn faster(rate: f64) -> f64 {
    if rate > 0.0 {
        rate * RATE_STEP
    } else if rate == 0.0 {
        REAL_TIME_RATE
    } else {
        let next = rate / RATE_STEP;
        // Below real time in reverse means stop.
        if next.abs() < REAL_TIME_RATE * 0.999 {
            0.0
        } else {
            next
        }
    }
}

pub fn slower(rate: f64) -> f64 {
    let next = -faster(-rate);
    if next == 0.0 {
        0.0
    } else {
        next
    }
}

pub fn zoom_in(fov: f64) -> f64 {
    (fov / FOV_STEP).max(MIN_FOV)
}

pub fn zoom_out(fov: f64) -> f64 {
    (fov * FOV_STEP).min(MAX_FOV)
}

/// A value changed locally and not yet confirmed by the server.
///
/// Cleared by the first status that arrives after the edit was sent.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PendingValue {
    value: Option<f64>,
    flushed: bool,
}

impl PendingValue {
    pub fn set(&mut self, value: f64) {
        self.value = Some(value);
        self.flushed = false;
    }

    pub fn on_flushed(&mut self) {
        if self.value.is_some() {
            self.flushed = true;
        }
    }

    pub fn on_status(&mut self) {
        if self.flushed {
            self.value = None;
            self.flushed = false;
        }
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// The local value, or `server` when nothing is pending.
    pub fn or(&self, server: f64) -> f64 {
        self.value.unwrap_or(server)
    }
}

pub struct ViewPanel {
    fov: PendingValue,
    rate: PendingValue,
}

impl ViewPanel {
    pub fn new() -> Self {
        Self {
            fov: PendingValue::default(),
            rate: PendingValue::default(),
        }
    }

    fn edit_fov(&mut self, fov: f64) -> Vec<Action> {
        self.fov.set(fov);
        vec![Action::Edit {
            path: paths::FOV.to_string(),
            payload: Payload::new().field("fov", fov),
        }]
    }

    fn edit_rate(&mut self, rate: f64) -> Vec<Action> {
        self.rate.set(rate);
        vec![Action::Edit {
            path: paths::TIME.to_string(),
            payload: Payload::new().field("timerate", rate),
        }]
    }
}

impl Component for ViewPanel {
    fn id(&self) -> ComponentId {
        ComponentId::ViewPanel
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        let Some(status) = state.status.as_ref() else {
            return vec![];
        };
        let fov = self.fov.or(status.view.fov);
        let rate = self.rate.or(status.time.timerate);
        match key.code {
            KeyCode::Char('+') | KeyCode::Char('=') => self.edit_fov(zoom_in(fov)),
            KeyCode::Char('-') => self.edit_fov(zoom_out(fov)),
            KeyCode::Char(']') => self.edit_rate(faster(rate)),
            KeyCode::Char('[') => self.edit_rate(slower(rate)),
            KeyCode::Char('x') => self.edit_rate(REAL_TIME_RATE),
            KeyCode::Char('p') => self.edit_rate(0.0),
            KeyCode::Char('n') => vec![Action::Send {
                path: paths::TIME.to_string(),
                payload: Payload::new().field("time", utc_to_jday(Utc::now())),
            }],
            _ => vec![],
        }
    }

    fn on_update(&mut self, event: &PanelEvent, _state: &AppState) {
        match event {
            PanelEvent::EditFlushed { path } if path == paths::FOV => self.fov.on_flushed(),
            PanelEvent::EditFlushed { path } if path == paths::TIME => self.rate.on_flushed(),
            PanelEvent::Status(_) => {
                self.fov.on_status();
                self.rate.on_status();
            }
            _ => {}
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let queued = state.pending_edits.contains(paths::FOV)
            || state.pending_edits.contains(paths::TIME);
        let badge = queued.then_some(Badge {
            text: "queued",
            color: C_PENDING,
        });
        let block = pane_chrome("view", Some('4'), focused, badge);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let Some(status) = state.status.as_ref() else {
            frame.render_widget(
                Paragraph::new(Span::styled(" waiting for server…", style_muted())),
                inner,
            );
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0)])
            .split(inner);

        let pending_style = |set: bool| {
            if set {
                Style::default().fg(C_PENDING)
            } else {
                style_bold()
            }
        };
        let values = vec![
            Line::from(vec![
                Span::styled(" field of view  ", style_muted()),
                Span::styled(
                    format!("{:.3}°", self.fov.or(status.view.fov)),
                    pending_style(self.fov.is_set()),
                ),
            ]),
            Line::from(vec![
                Span::styled(" time rate      ", style_muted()),
                Span::styled(
                    format_speed(self.rate.or(status.time.timerate) / REAL_TIME_RATE),
                    pending_style(self.rate.is_set()),
                ),
            ]),
            Line::from(vec![
                Span::styled(" projection     ", style_muted()),
                Span::styled(status.view.projection.clone(), style_default()),
            ]),
        ];
        frame.render_widget(Paragraph::new(values), chunks[0]);

        let keys = vec![
            Line::from(Span::styled(" +/-  zoom in / out", style_secondary())),
            Line::from(Span::styled(" [/]  slower / faster", style_secondary())),
            Line::from(Span::styled(" x    real time   p  pause", style_secondary())),
            Line::from(Span::styled(" n    jump to now", style_secondary())),
        ];
        frame.render_widget(Paragraph::new(keys), chunks[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;
    use remote_proto::protocol::{StatusResponse, TimeStatus, ViewStatus};
    use std::sync::Arc;
    use std::time::Instant;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn state_with(fov: f64, timerate: f64) -> AppState {
        let mut state = AppState::new(Instant::now());
        state.status = Some(Arc::new(StatusResponse {
            view: ViewStatus {
                fov,
                projection: "ProjectionStereographic".into(),
            },
            time: TimeStatus {
                timerate,
                ..Default::default()
            },
            ..Default::default()
        }));
        state
    }

    fn edit_value(actions: &[Action], field: &str) -> f64 {
        match actions {
            [Action::Edit { payload, .. }] => payload
                .get(field)
                .and_then(|v| v.parse().ok())
                .unwrap_or(f64::NAN),
            other => panic!("expected one edit, got {:?}", other),
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= b.abs() * 1e-9
    }

    #[test]
    fn test_rate_ladder() {
        let real = REAL_TIME_RATE;
        assert_eq!(faster(0.0), real);
        assert!(close(faster(real), 10.0 * real));
        assert!(close(slower(10.0 * real), real));
        assert_eq!(slower(real), 0.0);
        assert_eq!(slower(0.0), -real);
        assert!(close(slower(-real), -10.0 * real));
        assert_eq!(faster(-real), 0.0);
        assert!(close(faster(-10.0 * real), -real));
    }

    #[test]
    fn test_fov_is_clamped() {
        assert_eq!(zoom_in(MIN_FOV), MIN_FOV);
        assert_eq!(zoom_out(300.0), MAX_FOV);
        assert_eq!(zoom_in(50.0), 40.0);
    }

    #[test]
    fn test_pending_value_lifecycle() {
        let mut v = PendingValue::default();
        assert_eq!(v.or(1.0), 1.0);
        v.set(2.0);
        // A status from before the edit was sent does not clear it.
        v.on_status();
        assert_eq!(v.or(1.0), 2.0);
        v.on_flushed();
        assert_eq!(v.or(1.0), 2.0);
        v.on_status();
        assert!(!v.is_set());
        assert_eq!(v.or(1.0), 1.0);
    }

    #[test]
    fn test_repeated_zoom_steps_from_local_value() {
        let state = state_with(50.0, 0.0);
        let mut panel = ViewPanel::new();
        assert_eq!(edit_value(&panel.handle_key(key('+'), &state), "fov"), 40.0);
        // The server still says 50.
        assert_eq!(edit_value(&panel.handle_key(key('+'), &state), "fov"), 32.0);
        assert_eq!(edit_value(&panel.handle_key(key('-'), &state), "fov"), 40.0);
    }

    #[test]
    fn test_status_after_flush_resets_local_value() {
        let state = state_with(50.0, 0.0);
        let mut panel = ViewPanel::new();
        panel.handle_key(key('+'), &state);
        panel.on_update(
            &PanelEvent::EditFlushed {
                path: paths::FOV.to_string(),
            },
            &state,
        );
        panel.on_update(&PanelEvent::Status(Arc::clone(state.status.as_ref().unwrap())), &state);
        assert_eq!(edit_value(&panel.handle_key(key('+'), &state), "fov"), 40.0);
    }

    #[test]
    fn test_pause_and_now() {
        let state = state_with(60.0, REAL_TIME_RATE);
        let mut panel = ViewPanel::new();
        assert_eq!(edit_value(&panel.handle_key(key('p'), &state), "timerate"), 0.0);
        assert_eq!(
            edit_value(&panel.handle_key(key(']'), &state), "timerate"),
            REAL_TIME_RATE
        );

        let now = panel.handle_key(key('n'), &state);
        match now.as_slice() {
            [Action::Send { path, payload }] => {
                assert_eq!(path, paths::TIME);
                let jday: f64 = payload.get("time").and_then(|v| v.parse().ok()).unwrap();
                assert!((jday - utc_to_jday(Utc::now())).abs() < 1.0);
            }
            other => panic!("expected a send, got {:?}", other),
        }
    }

    #[test]
    fn test_no_status_no_commands() {
        let state = AppState::new(Instant::now());
        let mut panel = ViewPanel::new();
        assert!(panel.handle_key(key('+'), &state).is_empty());
    }
}
