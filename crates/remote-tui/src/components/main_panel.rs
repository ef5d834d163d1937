//! MainPanel — selection info plus a time, location and view summary.

use chrono::SubsecRound;
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};
use remote_client::PanelEvent;
use remote_proto::protocol::{jday_to_utc, StatusResponse, TimeStatus};

use crate::{
    action::{Action, ComponentId},
    app_state::{location_id, AppState},
    component::Component,
    markup::html_to_lines,
    theme::{
        style_bold, style_default, style_muted, style_secondary, C_CONNECTED, C_PENDING, C_SECONDARY,
    },
    widgets::pane_chrome::{pane_chrome, Badge},
};

const NO_SELECTION: &str = "No current selection";

pub struct MainPanel {
    /// HTML the cached lines were built from.
    selection_html: Option<String>,
    selection_lines: Vec<String>,
    scroll: u16,
}

impl MainPanel {
    pub fn new() -> Self {
        Self {
            selection_html: None,
            selection_lines: Vec::new(),
            scroll: 0,
        }
    }

    pub fn selection_lines(&self) -> &[String] {
        &self.selection_lines
    }

    fn sync_selection(&mut self, status: &StatusResponse) {
        let html = status.selection();
        if html == self.selection_html.as_deref() {
            return;
        }
        self.selection_lines = html.map(html_to_lines).unwrap_or_default();
        self.selection_html = html.map(str::to_string);
        self.scroll = 0;
    }

    fn summary_lines(&self, state: &AppState) -> Vec<Line<'static>> {
        let Some(status) = state.status.as_ref() else {
            return vec![Line::from(Span::styled(" waiting for server…", style_muted()))];
        };

        let time = state
            .displayed_jday()
            .and_then(|jday| format_local_time(jday, status.time.gmt_shift))
            .unwrap_or_else(|| "—".into());
        let mut time_spans = vec![
            label("time"),
            Span::styled(time, style_bold()),
            Span::styled(
                format!("  {}", format_offset(status.time.gmt_shift)),
                style_secondary(),
            ),
        ];
        if status.time.is_time_now {
            time_spans.push(Span::styled("  now", Style::default().fg(C_CONNECTED)));
        }

        let location = &status.location;
        let mut location_text = location_id(location);
        if !location.planet.is_empty() {
            location_text.push_str(&format!(" ({})", location.planet));
        }

        let script = if status.script.script_is_running {
            Span::styled(
                format!("running {}", status.script.running_script_id),
                Style::default().fg(C_PENDING),
            )
        } else {
            Span::styled("idle", style_muted())
        };

        vec![
            Line::from(time_spans),
            Line::from(vec![label("rate"), Span::styled(format_rate(&status.time), style_default())]),
            Line::from(vec![label("location"), Span::styled(location_text, style_default())]),
            Line::from(vec![
                label("view"),
                Span::styled(format!("fov {:.3}°", status.view.fov), style_default()),
                Span::styled(
                    format!("  {}", projection_label(&status.view.projection)),
                    style_secondary(),
                ),
            ]),
            Line::from(vec![label("script"), script]),
        ]
    }
}

impl Component for MainPanel {
    fn id(&self) -> ComponentId {
        ComponentId::MainPanel
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                let max = self.selection_lines.len().saturating_sub(1) as u16;
                self.scroll = (self.scroll + 1).min(max);
            }
            KeyCode::Up | KeyCode::Char('k') => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::Home | KeyCode::Char('g') => self.scroll = 0,
            _ => {}
        }
        vec![]
    }

    fn on_update(&mut self, event: &PanelEvent, _state: &AppState) {
        if let PanelEvent::Status(status) = event {
            self.sync_selection(status);
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(4), Constraint::Length(7)])
            .split(area);

        let selection: Vec<Line> = if self.selection_lines.is_empty() {
            vec![Line::from(Span::styled(NO_SELECTION, style_bold()))]
        } else {
            self.selection_lines
                .iter()
                .map(|l| Line::from(Span::styled(l.clone(), style_default())))
                .collect()
        };
        let badge = (self.scroll > 0).then(|| Badge {
            text: "more ↑",
            color: C_SECONDARY,
        });
        frame.render_widget(
            Paragraph::new(selection)
                .block(pane_chrome("selection", Some('1'), focused, badge))
                .wrap(Wrap { trim: true })
                .scroll((self.scroll, 0)),
            chunks[0],
        );

        frame.render_widget(
            Paragraph::new(self.summary_lines(state)).block(pane_chrome("status", None, false, None)),
            chunks[1],
        );
    }
}

fn label(text: &str) -> Span<'static> {
    Span::styled(format!(" {:<10}", text), style_muted())
}

/// Local calendar time for `jday` (UT) shifted by `gmt_shift` days.
pub fn format_local_time(jday: f64, gmt_shift: f64) -> Option<String> {
    jday_to_utc(jday + gmt_shift).map(|t| {
        t.round_subsecs(0)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    })
}

pub fn format_offset(gmt_shift: f64) -> String {
    let minutes = (gmt_shift * 1440.0).round() as i64;
    let sign = if minutes < 0 { '-' } else { '+' };
    let minutes = minutes.abs();
    format!("UTC{}{:02}:{:02}", sign, minutes / 60, minutes % 60)
}

pub fn format_rate(time: &TimeStatus) -> String {
    format_speed(time.speed_factor())
}

/// Label for a speed relative to real time.
pub fn format_speed(factor: f64) -> String {
    if factor == 0.0 {
        return "paused".into();
    }
    if (factor - 1.0).abs() < 1e-6 {
        return "real time".into();
    }
    let digits = if factor.abs() >= 10.0 {
        format!("{:.0}", factor)
    } else {
        let s = format!("{:.3}", factor);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    };
    format!("×{}", digits)
}

/// "ProjectionStereographic" → "stereographic".
fn projection_label(projection: &str) -> String {
    projection
        .strip_prefix("Projection")
        .unwrap_or(projection)
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    const SECONDS_PER_DAY: f64 = 86_400.0;

    fn time(timerate: f64) -> TimeStatus {
        TimeStatus {
            timerate,
            ..Default::default()
        }
    }

    #[test]
    fn test_local_time_applies_shift() {
        // J2000.0 is 2000-01-01 12:00 UT.
        assert_eq!(
            format_local_time(2_451_545.0, 0.0).as_deref(),
            Some("2000-01-01 12:00:00")
        );
        assert_eq!(
            format_local_time(2_451_545.0, 1.0 / 24.0).as_deref(),
            Some("2000-01-01 13:00:00")
        );
        assert_eq!(format_local_time(f64::NAN, 0.0), None);
    }

    #[test]
    fn test_offset() {
        assert_eq!(format_offset(0.0), "UTC+00:00");
        assert_eq!(format_offset(5.5 / 24.0), "UTC+05:30");
        assert_eq!(format_offset(-8.0 / 24.0), "UTC-08:00");
    }

    #[test]
    fn test_rate_labels() {
        assert_eq!(format_rate(&time(0.0)), "paused");
        assert_eq!(format_rate(&time(1.0 / SECONDS_PER_DAY)), "real time");
        assert_eq!(format_rate(&time(10.0 / SECONDS_PER_DAY)), "×10");
        assert_eq!(format_rate(&time(-0.5 / SECONDS_PER_DAY)), "×-0.5");
    }

    #[test]
    fn test_projection_label() {
        assert_eq!(projection_label("ProjectionFisheye"), "fisheye");
        assert_eq!(projection_label("custom"), "custom");
    }

    #[test]
    fn test_selection_reparsed_only_on_change() {
        let mut panel = MainPanel::new();
        let state = AppState::new(Instant::now());
        let status = Arc::new(StatusResponse {
            selection_info: Some("<h2>Vega</h2>Magnitude: <b>0.03</b>".into()),
            ..Default::default()
        });
        panel.on_update(&PanelEvent::Status(Arc::clone(&status)), &state);
        assert_eq!(panel.selection_lines(), ["Vega", "Magnitude: 0.03"]);

        panel.scroll = 1;
        panel.on_update(&PanelEvent::Status(status), &state);
        assert_eq!(panel.scroll, 1);

        panel.on_update(&PanelEvent::Status(Arc::new(StatusResponse::default())), &state);
        assert!(panel.selection_lines().is_empty());
        assert_eq!(panel.scroll, 0);
    }
}
