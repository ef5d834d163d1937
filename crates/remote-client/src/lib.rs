//! Client side of the remote control panel: transport, polling, command
//! sending, debounced edits and the controller that owns session state.

pub mod actions;
pub mod command;
pub mod connection;
pub mod controller;
pub mod error;
pub mod load;
pub mod poller;
pub mod transport;
pub mod update_queue;

pub use controller::{Controller, PanelEvent, PanelHandle, PanelRequest};
pub use error::{CommandError, ControllerGone, TransportError};
pub use transport::{HttpTransport, Transport};
