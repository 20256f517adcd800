//! Domain layer for isokey-bridge.
//!
//! Pure types with no I/O: the runtime configuration and the per-session
//! state machine vocabulary.  Nothing here touches tokio, sockets, or MIDI
//! drivers.

pub mod config;
pub mod session;

pub use config::BridgeConfig;
pub use session::{SessionReport, SessionState, SessionStats};
