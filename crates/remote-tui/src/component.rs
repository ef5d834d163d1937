//! Component trait — the interface every UI panel implements.
//!
//! - Components own their state and render themselves.
//! - They read `AppState` for data they don't own.
//! - They produce `Vec<Action>` and never talk to the controller directly.

use ratatui::crossterm::event::KeyEvent;
use ratatui::{layout::Rect, Frame};
use remote_client::PanelEvent;

use crate::action::{Action, ComponentId};
use crate::app_state::AppState;

pub trait Component {
    fn id(&self) -> ComponentId;

    /// Handle a key event. Only called when this component has focus.
    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action>;

    /// Called each UI tick for expiries and other time-based updates.
    fn tick(&mut self, _state: &AppState) -> Vec<Action> {
        Vec::new()
    }

    /// React to a dispatched action, focused or not.
    fn on_action(&mut self, _action: &Action, _state: &AppState) -> Vec<Action> {
        Vec::new()
    }

    /// `event` from the controller has just been stored in `state`.
    fn on_update(&mut self, _event: &PanelEvent, _state: &AppState) {}

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState);
}
