//! Lenient frame decoding and MIDI encoding for the browser protocol.
//!
//! Decoding never fails the caller: a frame that is not a JSON object, or
//! whose `type` is not a string, becomes [`InboundCommand::Unknown`] through
//! [`decode_frame`].  [`try_decode_frame`] exposes the reason for callers
//! that want to log it.
//!
//! Numeric fields are coerced the way a loosely typed browser client expects:
//!
//! | JSON value            | Result                         |
//! |-----------------------|--------------------------------|
//! | integer               | the integer                    |
//! | float                 | truncated toward zero          |
//! | string `" 64 "`       | parsed after trimming          |
//! | `true` / `false`      | `1` / `0`                      |
//! | anything else, absent | the documented field default   |
//!
//! A key repeated within one frame takes its last value, so
//! `{"type":"panic","type":"note_on"}` is a note-on.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::protocol::messages::{
    InboundCommand, OutboundMessage, StatusMessage, DEFAULT_NOTE, DEFAULT_NOTE_OFF_VELOCITY,
    DEFAULT_NOTE_ON_VELOCITY, DEFAULT_PITCH_BEND,
};
use crate::protocol::wire::{clamp_pitch_bend, panic_sequence, WireMessage};

/// Errors that can occur while decoding or encoding browser frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The text is not a JSON object with an optional string `type` field.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// An outbound message could not be serialized.
    #[error("failed to serialize outbound frame: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The loosely typed shape of every inbound frame.
///
/// Unknown fields are ignored; numeric fields stay as raw JSON so they can be
/// coerced individually.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    note: Option<Value>,
    velocity: Option<Value>,
    value: Option<Value>,
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decodes one inbound text frame, reporting why it was rejected.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedFrame`] if `raw` is not a JSON object
/// or its `type` field is present but not a string.
///
/// # Examples
///
/// ```rust
/// use isokey_core::{try_decode_frame, InboundCommand};
///
/// let cmd = try_decode_frame(r#"{"type":"note_on","note":64,"velocity":90}"#).unwrap();
/// assert_eq!(cmd, InboundCommand::NoteOn { note: 64, velocity: 90 });
/// assert!(try_decode_frame("not json").is_err());
/// ```
pub fn try_decode_frame(raw: &str) -> Result<InboundCommand, ProtocolError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;
    // Parsing to a `Value` first keeps the last of any repeated key.  Structs
    // also deserialize from arrays; only objects are valid frames.
    if !value.is_object() {
        return Err(ProtocolError::MalformedFrame("expected a JSON object".to_string()));
    }
    let frame: RawFrame =
        serde_json::from_value(value).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;

    let command = match frame.kind.as_deref() {
        Some("note_on") => InboundCommand::NoteOn {
            note: coerce_int(frame.note.as_ref()).unwrap_or(DEFAULT_NOTE),
            velocity: coerce_int(frame.velocity.as_ref()).unwrap_or(DEFAULT_NOTE_ON_VELOCITY),
        },
        Some("note_off") => InboundCommand::NoteOff {
            note: coerce_int(frame.note.as_ref()).unwrap_or(DEFAULT_NOTE),
            velocity: coerce_int(frame.velocity.as_ref()).unwrap_or(DEFAULT_NOTE_OFF_VELOCITY),
        },
        Some("pitch_bend") => InboundCommand::PitchBend {
            value: clamp_pitch_bend(coerce_int(frame.value.as_ref()).unwrap_or(DEFAULT_PITCH_BEND)),
        },
        Some("panic") => InboundCommand::Panic,
        _ => InboundCommand::Unknown,
    };

    Ok(command)
}

/// Decodes one inbound text frame; malformed frames become
/// [`InboundCommand::Unknown`].
///
/// # Examples
///
/// ```rust
/// use isokey_core::{decode_frame, InboundCommand};
///
/// assert_eq!(decode_frame("{oops"), InboundCommand::Unknown);
/// assert_eq!(decode_frame(r#"{"type":"panic"}"#), InboundCommand::Panic);
/// ```
pub fn decode_frame(raw: &str) -> InboundCommand {
    try_decode_frame(raw).unwrap_or(InboundCommand::Unknown)
}

/// Coerces a JSON value to an integer, or `None` if it has no integer reading.
fn coerce_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        // `f64 as i64` truncates toward zero and saturates at the i64 bounds.
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes a command as the MIDI messages to write, in order.
///
/// - Notes and pitch bend produce one message on `channel`.
/// - [`InboundCommand::Panic`] produces the silence-all sequence on every
///   channel regardless of `channel`.
/// - [`InboundCommand::Unknown`] produces nothing.
///
/// # Examples
///
/// ```rust
/// use isokey_core::{encode_command, InboundCommand};
///
/// let msgs = encode_command(&InboundCommand::NoteOn { note: 64, velocity: 90 }, 0);
/// assert_eq!(msgs[0].as_bytes(), &[0x90, 64, 90]);
/// ```
pub fn encode_command(command: &InboundCommand, channel: u8) -> Vec<WireMessage> {
    match *command {
        InboundCommand::NoteOn { note, velocity } => {
            vec![WireMessage::note_on(channel, note, velocity)]
        }
        InboundCommand::NoteOff { note, velocity } => {
            vec![WireMessage::note_off(channel, note, velocity)]
        }
        InboundCommand::PitchBend { value } => vec![WireMessage::pitch_bend(channel, value)],
        InboundCommand::Panic => panic_sequence(),
        InboundCommand::Unknown => Vec::new(),
    }
}

/// Serializes the handshake status frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Serialize`] if serialization fails.
pub fn encode_status(status: &StatusMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(&OutboundMessage::Status(status.clone()))?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
