//! LocationPanel — current observer location and a combobox to pick another.

use std::time::Instant;

use ratatui::crossterm::event::{KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use remote_client::PanelEvent;
use remote_proto::protocol::{paths, Payload};

use crate::{
    action::{Action, ComponentId},
    app_state::{location_id, AppState},
    component::Component,
    theme::{style_bold, style_default, style_muted, C_PENDING},
    widgets::{
        combobox::{ComboEvent, ComboOption, Combobox},
        pane_chrome::{pane_chrome, Badge},
    },
};

pub struct LocationPanel {
    combo: Combobox,
    /// Server location last shown in the field.
    shown: Option<String>,
}

impl LocationPanel {
    pub fn new() -> Self {
        Self {
            combo: Combobox::new("type to search locations"),
            shown: None,
        }
    }

    pub fn combo(&self) -> &Combobox {
        &self.combo
    }

    fn on_combo_event(&self, event: ComboEvent) -> Vec<Action> {
        match event {
            ComboEvent::Selected(value) => vec![Action::Edit {
                path: paths::LOCATION_SET.to_string(),
                payload: Payload::new().field("id", value),
            }],
            // The combobox shows its own tooltip.
            ComboEvent::Rejected | ComboEvent::None => vec![],
        }
    }

    /// Mirror the server location into the field unless the user is busy
    /// with it or a change is still queued.
    fn sync_shown(&mut self, state: &AppState) {
        if self.combo.is_editing() || state.pending_edits.contains(paths::LOCATION_SET) {
            return;
        }
        let Some(id) = state.location().map(location_id) else {
            return;
        };
        if self.shown.as_deref() != Some(id.as_str())
            || self.combo.text().is_empty()
            || self.combo.selected_value() != Some(id.as_str())
        {
            self.combo.autocomplete(&id);
            self.shown = Some(id);
        }
    }

    fn detail_lines(state: &AppState) -> Vec<Line<'static>> {
        let Some(location) = state.location() else {
            return vec![Line::from(Span::styled(" unknown", style_muted()))];
        };
        let row = |label: &str, value: String| {
            Line::from(vec![
                Span::styled(format!(" {:<11}", label), style_muted()),
                Span::styled(value, style_default()),
            ])
        };
        vec![
            Line::from(Span::styled(format!(" {}", location.name), style_bold())),
            row("region", location.region.clone()),
            row("planet", location.planet.clone()),
            row(
                "coordinates",
                format!("{:.4}°, {:.4}°", location.latitude, location.longitude),
            ),
            row("altitude", format!("{} m", location.altitude)),
            row("landscape", location.landscape_key.clone()),
        ]
    }
}

impl Component for LocationPanel {
    fn id(&self) -> ComponentId {
        ComponentId::LocationPanel
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        let was_editing = self.combo.is_editing();
        let event = self.combo.handle_key(key, Instant::now());
        let mut out = self.on_combo_event(event);
        if self.combo.is_editing() != was_editing {
            out.push(Action::Editing(self.combo.is_editing()));
        }
        out
    }

    fn tick(&mut self, _state: &AppState) -> Vec<Action> {
        self.combo.tick(Instant::now());
        vec![]
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        // Leaving the tab leaves the field.
        match action {
            Action::SwitchTab(_) | Action::NextTab | Action::PrevTab if self.combo.is_editing() => {
                let event = self.combo.end_edit(Instant::now());
                let mut out = self.on_combo_event(event);
                out.push(Action::Editing(false));
                out
            }
            _ => vec![],
        }
    }

    fn on_update(&mut self, event: &PanelEvent, state: &AppState) {
        match event {
            PanelEvent::Locations(locations) => {
                self.combo
                    .set_options(locations.iter().map(|l| ComboOption::new(l.as_str(), l.as_str())));
                self.sync_shown(state);
            }
            PanelEvent::Status(_) | PanelEvent::EditFlushed { .. } => self.sync_shown(state),
            _ => {}
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(8), Constraint::Min(3)])
            .split(area);

        frame.render_widget(
            Paragraph::new(Self::detail_lines(state)).block(pane_chrome("location", None, false, None)),
            chunks[0],
        );

        let badge = state
            .pending_edits
            .contains(paths::LOCATION_SET)
            .then_some(Badge {
                text: "queued",
                color: C_PENDING,
            });
        let block = pane_chrome("change location", Some('3'), focused, badge);
        let inner = block.inner(chunks[1]);
        frame.render_widget(block, chunks[1]);
        self.combo.draw(frame, inner, focused, Instant::now());
    }
}
