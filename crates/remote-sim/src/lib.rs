//! Simulated remote control server, used for tests and for running the panel
//! without the real application.

pub mod server;
pub mod state;

pub use server::{router, start_server, SimOptions};
pub use state::Simulation;
