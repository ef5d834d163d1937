pub mod actions_panel;
pub mod help_overlay;
pub mod location_panel;
pub mod main_panel;
pub mod no_response;
pub mod view_panel;
