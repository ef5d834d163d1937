//! ActionsPanel — server actions grouped by group name.
//!
//! Enter (or space) triggers the selected action; checkable ones flip their
//! checked state once the server reports the change.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use remote_client::PanelEvent;
use remote_proto::protocol::{ActionInfo, ActionList};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::{style_default, style_muted, style_selected_focused, C_CHECKED, C_SECONDARY},
    widgets::{pane_chrome::pane_chrome, scrollable_list::ScrollableList, status_bar::truncate},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ActionRow {
    pub group: String,
    pub action: ActionInfo,
}

pub struct ActionsPanel {
    pub list: ScrollableList<ActionRow>,
}

/// Flatten groups into rows, groups in name order.
fn rows(actions: &ActionList) -> Vec<ActionRow> {
    actions
        .iter()
        .flat_map(|(group, list)| {
            list.iter().map(move |action| ActionRow {
                group: group.clone(),
                action: action.clone(),
            })
        })
        .collect()
}

impl ActionsPanel {
    pub fn new() -> Self {
        Self {
            list: ScrollableList::new(),
        }
    }

    /// Rebuild from `actions`, keeping the selected action if it still exists.
    pub fn sync_actions(&mut self, actions: &ActionList) {
        let selected_id = self.list.selected_item().map(|r| r.action.id.clone());
        self.list.set_items(rows(actions));
        if let Some(id) = selected_id {
            if let Some(pos) = self.list.items.iter().position(|r| r.action.id == id) {
                self.list.set_selected(pos);
            }
        }
    }

    fn selected_id(&self) -> Option<String> {
        self.list.selected_item().map(|r| r.action.id.clone())
    }

    /// Visual lines: a header before each group's first row.  Returns the
    /// line index of the selected row alongside.
    fn lines(&self, width: usize, focused: bool) -> (Vec<Line<'static>>, usize) {
        let mut lines = Vec::new();
        let mut selected_line = 0;
        let mut current_group: Option<&str> = None;
        for (idx, row) in self.list.items.iter().enumerate() {
            if current_group != Some(row.group.as_str()) {
                if current_group.is_some() {
                    lines.push(Line::from(""));
                }
                lines.push(Line::from(Span::styled(
                    format!(" {}", row.group),
                    Style::default().fg(C_SECONDARY).add_modifier(Modifier::BOLD),
                )));
                current_group = Some(row.group.as_str());
            }

            let is_selected = idx == self.list.selected;
            if is_selected {
                selected_line = lines.len();
            }
            let (mark, mark_style) = match (row.action.is_checkable, row.action.is_checked) {
                (true, true) => ("[x] ", Style::default().fg(C_CHECKED)),
                (true, false) => ("[ ] ", style_muted()),
                (false, _) => (" ›  ", style_muted()),
            };
            let text_style = if is_selected && focused {
                style_selected_focused()
            } else {
                style_default()
            };
            lines.push(Line::from(vec![
                Span::styled(if is_selected { "  ▸ " } else { "    " }, text_style),
                Span::styled(mark, mark_style),
                Span::styled(truncate(&row.action.text, width.saturating_sub(8)), text_style),
            ]));
        }
        (lines, selected_line)
    }
}

impl Component for ActionsPanel {
    fn id(&self) -> ComponentId {
        ComponentId::ActionsPanel
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => self.list.select_down(1),
            KeyCode::Up | KeyCode::Char('k') => self.list.select_up(1),
            KeyCode::PageDown => self.list.select_down(10),
            KeyCode::PageUp => self.list.select_up(10),
            KeyCode::Home | KeyCode::Char('g') => self.list.select_first(),
            KeyCode::End | KeyCode::Char('G') => self.list.select_last(),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(id) = self.selected_id() {
                    return vec![Action::ToggleAction(id)];
                }
            }
            _ => {}
        }
        vec![]
    }

    fn on_update(&mut self, event: &PanelEvent, state: &AppState) {
        if matches!(event, PanelEvent::Actions(_)) {
            self.sync_actions(&state.actions);
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, _state: &AppState) {
        let block = pane_chrome("actions", Some('2'), focused, None);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if self.list.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled(" no actions loaded", style_muted())),
                inner,
            );
            return;
        }

        let height = inner.height as usize;
        let (lines, selected_line) = self.lines(inner.width as usize, focused);
        // Keep the selected row in view; headers make rows and lines differ.
        let scroll = selected_line.saturating_sub(height.saturating_sub(1));
        frame.render_widget(Paragraph::new(lines).scroll((scroll as u16, 0)), inner);
    }
}
