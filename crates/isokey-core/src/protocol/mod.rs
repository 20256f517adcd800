//! Protocol module containing the browser message types and the MIDI codec.

pub mod codec;
pub mod messages;
pub mod wire;

pub use codec::{decode_frame, encode_command, encode_status, try_decode_frame, ProtocolError};
pub use messages::*;
pub use wire::WireMessage;
