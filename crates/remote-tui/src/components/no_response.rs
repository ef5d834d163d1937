//! NoResponse — modal shown while the server is unreachable.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    components::help_overlay::centered_rect,
    theme::{style_muted, style_secondary, C_ACCENT, C_POPUP_BG},
};

pub struct NoResponse;

impl NoResponse {
    pub fn new() -> Self {
        Self
    }

    pub fn is_visible(state: &AppState) -> bool {
        !state.connected
    }
}

impl Component for NoResponse {
    fn id(&self) -> ComponentId {
        ComponentId::NoResponse
    }

    /// Swallows everything but quit.
    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        match key.code {
            KeyCode::Char('q') => vec![Action::Quit],
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                vec![Action::Quit]
            }
            _ => vec![],
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, state: &AppState) {
        if !Self::is_visible(state) {
            return;
        }
        let popup = centered_rect(50, 7, area);
        let lines = vec![
            Line::from(Span::styled(
                "No response from server",
                Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(
                format!("Last contact {} s ago, retrying…", state.disconnected_secs),
                style_secondary(),
            )),
            Line::from(Span::styled("q to quit", style_muted())),
        ];
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(lines).alignment(Alignment::Center).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(C_ACCENT))
                    .style(Style::default().bg(C_POPUP_BG)),
            ),
            popup,
        );
    }
}
