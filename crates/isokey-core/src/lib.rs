//! # isokey-core
//!
//! Shared protocol library for the IsoKey MIDI bridge.
//!
//! The browser keyboard sends small JSON records (`{"type":"note_on",...}`)
//! over a WebSocket.  This crate turns those records into typed commands and
//! the commands into raw MIDI bytes.  It has no dependencies on sockets, MIDI
//! drivers, or async runtimes, so every rule can be unit tested directly.
//!
//! - **`protocol::messages`** – the inbound command model and the outbound
//!   status frame.
//! - **`protocol::codec`** – lenient JSON decoding (malformed input never
//!   fails the caller) and command → wire encoding.
//! - **`protocol::wire`** – MIDI status bytes, 7/14-bit clamping, and the
//!   panic (silence-all) sequence.

pub mod protocol;

// Re-export the most-used items at the crate root so callers can write
// `isokey_core::decode_frame` instead of the full module path.
pub use protocol::codec::{
    decode_frame, encode_command, encode_status, try_decode_frame, ProtocolError,
};
pub use protocol::messages::{InboundCommand, OutboundMessage, StatusMessage};
pub use protocol::wire::{clamp_data_byte, clamp_pitch_bend, WireMessage};
