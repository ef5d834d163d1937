//! Tab bar and tab memory.
//!
//! The active tab index is remembered in the session store, so reopening
//! the panel during the same login session lands on the same tab.  Without
//! a session store the panel always starts on the first tab.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Tabs,
    Frame,
};
use remote_proto::session::{SessionStore, ACTIVE_TAB_KEY};
use tracing::{debug, warn};

use crate::action::Tab;
use crate::theme::{C_MUTED, C_NUMBER_HINT, C_PANEL_BORDER, C_PRIMARY};

pub struct TabMemory {
    store: Option<SessionStore>,
}

impl TabMemory {
    pub fn new(store: Option<SessionStore>) -> Self {
        Self { store }
    }

    /// The remembered tab, or the first one.
    pub fn restore(&self) -> Tab {
        let remembered = self
            .store
            .as_ref()
            .and_then(|s| s.get(ACTIVE_TAB_KEY))
            .and_then(|v| v.parse::<usize>().ok())
            .and_then(Tab::from_index);
        debug!("restored tab: {:?}", remembered);
        remembered.unwrap_or(Tab::Main)
    }

    pub fn remember(&mut self, tab: Tab) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        if let Err(e) = store.set(ACTIVE_TAB_KEY, tab.index()) {
            warn!("could not remember active tab: {}", e);
        }
    }
}

pub fn draw_tabs(frame: &mut Frame, area: Rect, active: Tab) {
    let titles: Vec<Line> = Tab::ALL
        .iter()
        .map(|tab| {
            Line::from(vec![
                Span::styled(
                    format!("{} ", tab.index() + 1),
                    Style::default().fg(C_NUMBER_HINT),
                ),
                Span::raw(tab.title()),
            ])
        })
        .collect();
    let tabs = Tabs::new(titles)
        .select(active.index())
        .style(Style::default().fg(C_MUTED))
        .highlight_style(
            Style::default()
                .fg(C_PRIMARY)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )
        .divider(Span::styled("│", Style::default().fg(C_PANEL_BORDER)));
    frame.render_widget(tabs, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restores_remembered_tab() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut memory = TabMemory::new(Some(SessionStore::open(path.clone())));
        assert_eq!(memory.restore(), Tab::Main);
        memory.remember(Tab::Location);

        let reopened = TabMemory::new(Some(SessionStore::open(path)));
        assert_eq!(reopened.restore(), Tab::Location);
    }

    #[test]
    fn test_without_store_starts_on_first_tab() {
        let mut memory = TabMemory::new(None);
        memory.remember(Tab::View);
        assert_eq!(memory.restore(), Tab::Main);
    }

    #[test]
    fn test_out_of_range_index_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut store = SessionStore::open(path.clone());
        store.set(ACTIVE_TAB_KEY, 9).unwrap();
        assert_eq!(TabMemory::new(Some(SessionStore::open(path))).restore(), Tab::Main);
    }
}
