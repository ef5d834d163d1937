//! Status bar — bottom line with connection state, busy spinner, last log
//! line and keybindings.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::action::Tab;
use crate::theme::{C_ACCENT, C_CONNECTED, C_MODE_EDIT, C_MODE_NORMAL, C_MUTED, C_PENDING, C_SECONDARY};

pub const SPINNER_FRAMES: &[&str] = &["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    Normal,
    /// A text field owns the keyboard.
    Edit,
}

impl InputMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Edit => "EDIT",
        }
    }

    pub fn color(self) -> ratatui::style::Color {
        match self {
            Self::Normal => C_MODE_NORMAL,
            Self::Edit => C_MODE_EDIT,
        }
    }
}

pub struct StatusLine<'a> {
    pub connected: bool,
    /// `Some(frame)` while the load indicator is shown.
    pub spinner: Option<usize>,
    pub last_log: Option<&'a str>,
    pub mode: InputMode,
    pub tab: Tab,
}

/// Keys relevant to `tab` in `mode`.
pub fn key_hints(mode: InputMode, tab: Tab) -> &'static str {
    match mode {
        InputMode::Edit => "type to search  ↑↓ pick  Enter select  Esc done",
        InputMode::Normal => match tab {
            Tab::Main => "1-4/Tab tabs  r refresh  ? help  q quit",
            Tab::Actions => "↑↓/jk select  Enter toggle  1-4/Tab tabs  ? help  q quit",
            Tab::Location => "Enter search  ↓ list all  1-4/Tab tabs  ? help  q quit",
            Tab::View => "+/- fov  [/] rate  x real  p pause  n now  1-4/Tab tabs  ? help  q quit",
        },
    }
}

pub fn draw_status_bar(frame: &mut Frame, area: Rect, status: &StatusLine<'_>) {
    let conn_span = if status.connected {
        Span::styled(" ● ", Style::default().fg(C_CONNECTED))
    } else {
        Span::styled(" ○ ", Style::default().fg(C_ACCENT))
    };
    let busy_span = match status.spinner {
        Some(frame_idx) => Span::styled(
            format!("{} ", SPINNER_FRAMES[frame_idx % SPINNER_FRAMES.len()]),
            Style::default().fg(C_PENDING),
        ),
        None => Span::raw("  "),
    };
    let mode_span = Span::styled(
        format!("{} ", status.mode.label()),
        Style::default()
            .fg(status.mode.color())
            .add_modifier(Modifier::BOLD),
    );
    let keys = key_hints(status.mode, status.tab);
    let keys_span = Span::styled(keys, Style::default().fg(C_MUTED));

    let mut spans = vec![conn_span, busy_span, mode_span, keys_span];

    // Last warning on the right, if it fits.
    if let Some(log) = status.last_log {
        let used = 3 + 2 + status.mode.label().len() + 1 + keys.width();
        let room = (area.width as usize).saturating_sub(used + 3);
        if room > 10 {
            spans.push(Span::raw("   "));
            spans.push(Span::styled(
                truncate(log, room),
                Style::default().fg(C_SECONDARY),
            ));
        }
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Cut `text` to at most `max` display columns, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for ch in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + w + 1 > max {
            break;
        }
        out.push(ch);
        width += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_display_width() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
        // Wide glyphs count double.
        assert_eq!(truncate("日本語テキスト", 7), "日本語…");
    }

    #[test]
    fn test_edit_mode_hints_override_tab() {
        assert_eq!(
            key_hints(InputMode::Edit, Tab::Main),
            key_hints(InputMode::Edit, Tab::View)
        );
        assert!(key_hints(InputMode::Normal, Tab::View).contains("fov"));
    }
}
