//! Combobox — a text field with a filtered drop-down of options.
//!
//! Typing filters the options by a case-insensitive substring match on their
//! text.  Picking an option from the list emits `ComboEvent::Selected`.
//! Leaving the field after typing something else either selects the option
//! whose text matches exactly (without an event) or clears the field and
//! shows a short "no match" tooltip.

use std::time::{Duration, Instant};

use ratatui::crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use regex::RegexBuilder;
use tui_input::{backend::crossterm::EventHandler, Input};

use crate::theme::{
    style_default, style_input, style_muted, style_selected_focused, C_INPUT_BG, C_SECONDARY,
    C_TOAST_WARNING,
};
use crate::widgets::scrollable_list::ScrollableList;
use crate::widgets::status_bar::truncate;

pub const NO_MATCH_TOOLTIP: &str = "Input did not match any item";
pub const TOOLTIP_DURATION: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComboOption {
    pub value: String,
    pub text: String,
}

impl ComboOption {
    pub fn new(value: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComboEvent {
    None,
    /// An option was picked from the list; carries its value.
    Selected(String),
    /// Typed text matched no option and was cleared.
    Rejected,
}

pub struct Combobox {
    options: Vec<ComboOption>,
    input: Input,
    selected: Option<String>,
    /// Indices into `options` currently listed.
    dropdown: ScrollableList<usize>,
    open: bool,
    editing: bool,
    /// The text was typed since the last selection.
    changed: bool,
    tooltip_until: Option<Instant>,
    placeholder: String,
}

impl Combobox {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            options: Vec::new(),
            input: Input::default(),
            selected: None,
            dropdown: ScrollableList::new(),
            open: false,
            editing: false,
            changed: false,
            tooltip_until: None,
            placeholder: placeholder.into(),
        }
    }

    /// Replace the options.  Options without a value are never listed.
    pub fn set_options(&mut self, options: impl IntoIterator<Item = ComboOption>) {
        self.options = options
            .into_iter()
            .filter(|o| !o.value.is_empty())
            .collect();
        if self.open {
            let term = self.term();
            self.refresh(&term);
        }
    }

    pub fn options(&self) -> &[ComboOption] {
        &self.options
    }

    pub fn selected_value(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn text(&self) -> &str {
        self.input.value()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    /// Options currently listed in the drop-down.
    pub fn listed(&self) -> Vec<&ComboOption> {
        self.dropdown
            .items
            .iter()
            .filter_map(|&i| self.options.get(i))
            .collect()
    }

    pub fn tooltip(&self, now: Instant) -> Option<&'static str> {
        match self.tooltip_until {
            Some(until) if now < until => Some(NO_MATCH_TOOLTIP),
            _ => None,
        }
    }

    /// Indices of the options whose text contains `term`, ignoring case.
    pub fn search(&self, term: &str) -> Vec<usize> {
        if term.is_empty() {
            return (0..self.options.len()).collect();
        }
        let Ok(matcher) = RegexBuilder::new(&regex::escape(term))
            .case_insensitive(true)
            .build()
        else {
            return Vec::new();
        };
        self.options
            .iter()
            .enumerate()
            .filter(|(_, o)| matcher.is_match(&o.text))
            .map(|(i, _)| i)
            .collect()
    }

    fn term(&self) -> String {
        if self.changed {
            self.input.value().to_string()
        } else {
            String::new()
        }
    }

    fn refresh(&mut self, term: &str) {
        let matches = self.search(term);
        self.dropdown.set_items(matches);
    }

    fn open_with(&mut self, term: &str) {
        self.refresh(term);
        self.dropdown.select_first();
        // Highlight the current selection when listing everything.
        if let Some(selected) = &self.selected {
            if let Some(pos) = self
                .dropdown
                .items
                .iter()
                .position(|&i| self.options[i].value == *selected)
            {
                self.dropdown.set_selected(pos);
            }
        }
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    /// The list button: list every option, or close the list if it is open.
    pub fn show_all(&mut self) {
        if self.open {
            self.close();
            return;
        }
        self.open_with("");
    }

    /// Pick `options[idx]`.
    pub fn select(&mut self, idx: usize) -> ComboEvent {
        let Some(option) = self.options.get(idx) else {
            return ComboEvent::None;
        };
        let value = option.value.clone();
        self.input = Input::new(option.text.clone());
        self.selected = Some(value.clone());
        self.changed = false;
        self.tooltip_until = None;
        self.close();
        ComboEvent::Selected(value)
    }

    /// The field was left without picking from the list.
    pub fn commit(&mut self, now: Instant) -> ComboEvent {
        self.close();
        if !self.changed {
            return ComboEvent::None;
        }
        self.changed = false;

        let typed = self.input.value().to_lowercase();
        if let Some(option) = self.options.iter().find(|o| o.text.to_lowercase() == typed) {
            self.selected = Some(option.value.clone());
            return ComboEvent::None;
        }

        self.input.reset();
        self.selected = None;
        self.tooltip_until = Some(now + TOOLTIP_DURATION);
        ComboEvent::Rejected
    }

    /// Show `value` as the current selection without emitting an event.
    /// A value with no matching option is shown as typed but not selected.
    pub fn autocomplete(&mut self, value: &str) {
        match self.options.iter().find(|o| o.value == value) {
            Some(option) => {
                self.input = Input::new(option.text.clone());
                self.selected = Some(option.value.clone());
            }
            None => {
                self.input = Input::new(value.to_string());
                self.selected = None;
            }
        }
        self.changed = false;
    }

    pub fn begin_edit(&mut self) {
        self.editing = true;
        let term = self.term();
        self.open_with(&term);
    }

    pub fn end_edit(&mut self, now: Instant) -> ComboEvent {
        self.editing = false;
        self.commit(now)
    }

    pub fn tick(&mut self, now: Instant) {
        if matches!(self.tooltip_until, Some(until) if now >= until) {
            self.tooltip_until = None;
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> ComboEvent {
        if !self.editing {
            match key.code {
                KeyCode::Enter | KeyCode::Char('/') | KeyCode::Char('i') => self.begin_edit(),
                KeyCode::Down => self.show_all(),
                KeyCode::Esc => self.close(),
                _ => {}
            }
            return ComboEvent::None;
        }

        match key.code {
            KeyCode::Esc => self.end_edit(now),
            KeyCode::Enter => {
                let highlighted = if self.open {
                    self.dropdown.selected_item().copied()
                } else {
                    None
                };
                match highlighted {
                    Some(idx) => {
                        self.editing = false;
                        self.select(idx)
                    }
                    None => self.end_edit(now),
                }
            }
            KeyCode::Up => {
                self.dropdown.select_up(1);
                ComboEvent::None
            }
            KeyCode::Down => {
                if !self.open {
                    let term = self.term();
                    self.open_with(&term);
                } else {
                    self.dropdown.select_down(1);
                }
                ComboEvent::None
            }
            _ => {
                let before = self.input.value().to_string();
                self.input.handle_event(&Event::Key(key));
                if self.input.value() != before {
                    self.changed = true;
                    let term = self.input.value().to_string();
                    self.open_with(&term);
                }
                ComboEvent::None
            }
        }
    }

    /// Draw the field in the first row of `area` and the list below it.
    pub fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, now: Instant) {
        if area.height == 0 || area.width < 4 {
            return;
        }
        let field = Rect { height: 1, ..area };
        let width = field.width.saturating_sub(4) as usize;
        let scroll = self.input.visual_scroll(width);
        let value = self.input.value();
        let text = if value.is_empty() && !self.editing {
            Span::styled(format!(" {}", self.placeholder), style_muted())
        } else {
            let visible: String = value.chars().skip(scroll).collect();
            Span::styled(format!(" {}", truncate(&visible, width)), style_input())
        };
        let button = Span::styled(
            if self.open { " ▴ " } else { " ▾ " },
            Style::default().fg(C_SECONDARY).bg(C_INPUT_BG),
        );
        let pad = (field.width as usize).saturating_sub(width + 1 + 3);
        frame.render_widget(
            Paragraph::new(Line::from(vec![text, Span::raw(" ".repeat(pad)), button]))
                .style(Style::default().bg(C_INPUT_BG)),
            field,
        );
        if self.editing && focused {
            let cursor_x = field.x + 1 + (self.input.visual_cursor().saturating_sub(scroll)) as u16;
            frame.set_cursor_position((cursor_x.min(field.x + field.width - 1), field.y));
        }

        let mut y = field.y + 1;
        let bottom = area.y + area.height;
        if let Some(tip) = self.tooltip(now) {
            if y < bottom {
                frame.render_widget(
                    Paragraph::new(Span::styled(
                        format!(" ! {}", tip),
                        Style::default().fg(C_TOAST_WARNING),
                    )),
                    Rect { y, height: 1, ..area },
                );
                y += 1;
            }
        }

        if !self.open || y >= bottom {
            return;
        }
        let list_area = Rect {
            y,
            height: bottom - y,
            ..area
        };
        if self.dropdown.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled("  no matches", style_muted())),
                list_area,
            );
            return;
        }
        let height = list_area.height as usize;
        self.dropdown.ensure_visible(height);
        let selected = self.dropdown.selected;
        let lines: Vec<Line> = self
            .dropdown
            .visible_items(height)
            .into_iter()
            .map(|(row, &idx)| {
                let style = if row == selected {
                    style_selected_focused()
                } else {
                    style_default()
                };
                let marker = if row == selected { "▸ " } else { "  " };
                Line::from(Span::styled(
                    format!(
                        "{}{}",
                        marker,
                        truncate(&self.options[idx].text, list_area.width.saturating_sub(2) as usize)
                    ),
                    style,
                ))
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), list_area);
    }
}
