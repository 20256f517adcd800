//! Message types for the browser-facing WebSocket protocol.
//!
//! # Message flow
//!
//! ```text
//! Browser → Bridge:  JSON text frame  →  InboundCommand  →  MIDI bytes
//! Bridge  → Browser: StatusMessage    →  OutboundMessage  →  JSON text frame
//! ```
//!
//! Inbound frames are decoded leniently by [`crate::protocol::codec`], so the
//! command enum is not `Deserialize` itself: it is the *result* of decoding,
//! after defaults and coercions have been applied.  The outbound direction is
//! strict and uses serde's internally tagged representation:
//!
//! ```json
//! {"type":"status","connected":true,"port":"Midi Through","outputs":["Midi Through"]}
//! ```

use serde::{Deserialize, Serialize};

/// Note number used when a note command carries no usable `note` field.
pub const DEFAULT_NOTE: i64 = 60;

/// Velocity used when a `note_on` carries no usable `velocity` field.
pub const DEFAULT_NOTE_ON_VELOCITY: i64 = 100;

/// Velocity used when a `note_off` carries no usable `velocity` field.
pub const DEFAULT_NOTE_OFF_VELOCITY: i64 = 0;

/// Pitch-bend value used when a `pitch_bend` carries no usable `value` field.
pub const DEFAULT_PITCH_BEND: i64 = 0;

// ── Browser → Bridge ──────────────────────────────────────────────────────────

/// A decoded command from the browser keyboard.
///
/// This is a closed set: every JSON `type` the bridge does not act on maps to
/// [`InboundCommand::Unknown`], which is dropped without side effects.
///
/// Note and velocity fields hold the coerced integer exactly as the browser
/// sent it; the wire encoder clamps them into the 7-bit data range.  The
/// pitch-bend value is clamped to the signed 14-bit range during decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundCommand {
    /// Start a note.
    NoteOn {
        /// Note number (clamped to 0–127 on the wire).
        note: i64,
        /// Strike velocity (clamped to 0–127 on the wire).
        velocity: i64,
    },

    /// Release a note.
    NoteOff {
        /// Note number (clamped to 0–127 on the wire).
        note: i64,
        /// Release velocity (clamped to 0–127 on the wire).
        velocity: i64,
    },

    /// Move the pitch wheel.
    PitchBend {
        /// Signed bend amount in `-8192..=8191`; `0` is centre.
        value: i16,
    },

    /// Silence every sounding note on every channel.
    Panic,

    /// Anything else: unrecognised `type`, missing `type`, or a malformed frame.
    Unknown,
}

impl InboundCommand {
    /// Returns a short name for the command kind, for log messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            InboundCommand::NoteOn { .. } => "note_on",
            InboundCommand::NoteOff { .. } => "note_off",
            InboundCommand::PitchBend { .. } => "pitch_bend",
            InboundCommand::Panic => "panic",
            InboundCommand::Unknown => "unknown",
        }
    }

    /// `true` for commands that produce MIDI output.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, InboundCommand::Unknown)
    }
}

// ── Bridge → Browser ──────────────────────────────────────────────────────────

/// Device status reported to the browser once, right after the connection
/// is established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// `true` if a MIDI output was opened for this connection.
    pub connected: bool,
    /// Name of the opened output, or `null` when none is open.
    pub port: Option<String>,
    /// Every output name visible to the system, in enumeration order.
    ///
    /// Listed even when nothing could be opened so the UI can show the
    /// choices.
    pub outputs: Vec<String>,
}

/// All frames the bridge sends to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Handshake status frame.
    Status(StatusMessage),
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_with_type_discriminant() {
        // Arrange
        let msg = OutboundMessage::Status(StatusMessage {
            connected: true,
            port: Some("Midi Through Port-0".to_string()),
            outputs: vec!["Midi Through Port-0".to_string()],
        });

        // Act
        let json = serde_json::to_value(&msg).unwrap();

        // Assert: the tag and all fields are flattened into one object
        assert_eq!(json["type"], "status");
        assert_eq!(json["connected"], true);
        assert_eq!(json["port"], "Midi Through Port-0");
        assert_eq!(json["outputs"][0], "Midi Through Port-0");
    }

    #[test]
    fn test_status_without_port_serializes_null() {
        let msg = OutboundMessage::Status(StatusMessage {
            connected: false,
            port: None,
            outputs: vec![],
        });

        let json = serde_json::to_value(&msg).unwrap();

        assert!(json["port"].is_null());
        assert_eq!(json["outputs"], serde_json::json!([]));
    }

    #[test]
    fn test_status_deserializes_from_browser_view() {
        // The browser never sends this, but the test client in the
        // integration suite parses it back.
        let json = r#"{"type":"status","connected":false,"port":null,"outputs":["A","B"]}"#;

        let msg: OutboundMessage = serde_json::from_str(json).unwrap();

        let OutboundMessage::Status(status) = msg;
        assert!(!status.connected);
        assert_eq!(status.port, None);
        assert_eq!(status.outputs, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_kind_name_covers_every_variant() {
        assert_eq!(InboundCommand::NoteOn { note: 60, velocity: 1 }.kind_name(), "note_on");
        assert_eq!(InboundCommand::NoteOff { note: 60, velocity: 0 }.kind_name(), "note_off");
        assert_eq!(InboundCommand::PitchBend { value: 0 }.kind_name(), "pitch_bend");
        assert_eq!(InboundCommand::Panic.kind_name(), "panic");
        assert_eq!(InboundCommand::Unknown.kind_name(), "unknown");
    }

    #[test]
    fn test_only_unknown_is_not_actionable() {
        assert!(InboundCommand::Panic.is_actionable());
        assert!(InboundCommand::PitchBend { value: 5 }.is_actionable());
        assert!(!InboundCommand::Unknown.is_actionable());
    }
}
