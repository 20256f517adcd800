//! Infrastructure layer for isokey-bridge.
//!
//! Everything that touches the outside world: the HTTP router, the upgraded
//! WebSocket, and the MIDI driver.  Implements the traits the
//! application layer declares.

pub mod midi_output;
pub mod ws_server;
pub mod ws_transport;

pub use midi_output::system_backend;
pub use ws_server::{run_server, serve};
