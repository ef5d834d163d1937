//! Action enum — all user-initiated intents and internal events.

use remote_proto::protocol::Payload;

/// Unique identifier for a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    MainPanel,
    ActionsPanel,
    LocationPanel,
    ViewPanel,
    HelpOverlay,
    NoResponse,
}

/// Which tab is shown in the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Main,
    Actions,
    Location,
    View,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Main, Tab::Actions, Tab::Location, Tab::View];

    pub fn index(self) -> usize {
        match self {
            Tab::Main => 0,
            Tab::Actions => 1,
            Tab::Location => 2,
            Tab::View => 3,
        }
    }

    pub fn from_index(idx: usize) -> Option<Tab> {
        Self::ALL.get(idx).copied()
    }

    pub fn title(self) -> &'static str {
        match self {
            Tab::Main => "main",
            Tab::Actions => "actions",
            Tab::Location => "location",
            Tab::View => "view",
        }
    }

    pub fn next(self) -> Tab {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Tab {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// The component rendered in the body for this tab.
    pub fn component(self) -> ComponentId {
        match self {
            Tab::Main => ComponentId::MainPanel,
            Tab::Actions => ComponentId::ActionsPanel,
            Tab::Location => ComponentId::LocationPanel,
            Tab::View => ComponentId::ViewPanel,
        }
    }
}

/// All actions that can flow through the system.
/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone)]
pub enum Action {
    // ── Navigation ───────────────────────────────────────────────────────────
    SwitchTab(Tab),
    NextTab,
    PrevTab,

    // ── Server commands ──────────────────────────────────────────────────────
    /// POST right away.
    Send { path: String, payload: Payload },
    /// POST after the field's quiet period.
    Edit { path: String, payload: Payload },
    ToggleAction(String),
    Refresh,
    ReloadLists,

    // ── UI ───────────────────────────────────────────────────────────────────
    /// Text input gained or lost focus.
    Editing(bool),
    ToggleHelp,

    // ── System ───────────────────────────────────────────────────────────────
    Quit,
    Noop,
}
