//! MIDI 1.0 channel-voice wire format.
//!
//! Every message the bridge emits is three bytes:
//!
//! ```text
//! [status | channel][data1][data2]
//! ```
//!
//! Status bytes have the high bit set; data bytes are 7-bit (`0..=127`).
//! Pitch bend carries a 14-bit value split across the two data bytes, least
//! significant 7 bits first, offset so that `8192` is centre.

/// Note Off status nibble.
pub const NOTE_OFF: u8 = 0x80;
/// Note On status nibble.
pub const NOTE_ON: u8 = 0x90;
/// Control Change status nibble.
pub const CONTROL_CHANGE: u8 = 0xB0;
/// Pitch Bend status nibble.
pub const PITCH_BEND: u8 = 0xE0;

/// Channel-mode controller: All Sound Off.
pub const CC_ALL_SOUND_OFF: u8 = 120;
/// Channel-mode controller: All Notes Off.
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// Highest MIDI channel index (channels are `0..=15` on the wire).
pub const MAX_CHANNEL: u8 = 15;
/// Number of MIDI channels.
pub const CHANNEL_COUNT: u8 = 16;

/// Lowest signed pitch-bend value.
pub const PITCH_BEND_MIN: i16 = -8192;
/// Highest signed pitch-bend value.
pub const PITCH_BEND_MAX: i16 = 8191;

const PITCH_BEND_CENTER: i32 = 8192;

/// Clamps an arbitrary integer into the 7-bit data-byte range.
pub fn clamp_data_byte(value: i64) -> u8 {
    value.clamp(0, 127) as u8
}

/// Clamps an arbitrary integer into the signed 14-bit pitch-bend range.
///
/// The result always satisfies `-8192 <= v <= 8191`, and clamping a clamped
/// value returns it unchanged.
pub fn clamp_pitch_bend(value: i64) -> i16 {
    value.clamp(i64::from(PITCH_BEND_MIN), i64::from(PITCH_BEND_MAX)) as i16
}

/// A single three-byte MIDI channel-voice message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WireMessage([u8; 3]);

impl WireMessage {
    /// Note On.  Note and velocity are clamped to `0..=127`.
    pub fn note_on(channel: u8, note: i64, velocity: i64) -> Self {
        Self([
            NOTE_ON | channel.min(MAX_CHANNEL),
            clamp_data_byte(note),
            clamp_data_byte(velocity),
        ])
    }

    /// Note Off.  Note and velocity are clamped to `0..=127`.
    pub fn note_off(channel: u8, note: i64, velocity: i64) -> Self {
        Self([
            NOTE_OFF | channel.min(MAX_CHANNEL),
            clamp_data_byte(note),
            clamp_data_byte(velocity),
        ])
    }

    /// Pitch Bend from a signed value; out-of-range input is clamped.
    pub fn pitch_bend(channel: u8, value: i16) -> Self {
        let clamped = i32::from(value.clamp(PITCH_BEND_MIN, PITCH_BEND_MAX));
        let unsigned = (clamped + PITCH_BEND_CENTER) as u16;
        Self([
            PITCH_BEND | channel.min(MAX_CHANNEL),
            (unsigned & 0x7F) as u8,
            ((unsigned >> 7) & 0x7F) as u8,
        ])
    }

    /// Control Change.  Controller number and value are masked to 7 bits.
    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self([
            CONTROL_CHANGE | channel.min(MAX_CHANNEL),
            controller & 0x7F,
            value & 0x7F,
        ])
    }

    /// The raw bytes, ready to hand to a MIDI driver.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The status byte (`kind | channel`).
    pub fn status(&self) -> u8 {
        self.0[0]
    }

    /// The MIDI channel encoded in the status byte.
    pub fn channel(&self) -> u8 {
        self.0[0] & 0x0F
    }

    /// Reassembles the signed value of a pitch-bend message.
    ///
    /// Returns `None` for any other kind of message.
    pub fn pitch_bend_value(&self) -> Option<i16> {
        if self.0[0] & 0xF0 != PITCH_BEND {
            return None;
        }
        let unsigned = i32::from(self.0[1]) | (i32::from(self.0[2]) << 7);
        Some((unsigned - PITCH_BEND_CENTER) as i16)
    }
}

/// The silence-all sequence: All Sound Off then All Notes Off on every
/// channel, in channel order.
pub fn panic_sequence() -> Vec<WireMessage> {
    (0..CHANNEL_COUNT)
        .flat_map(|channel| {
            [
                WireMessage::control_change(channel, CC_ALL_SOUND_OFF, 0),
                WireMessage::control_change(channel, CC_ALL_NOTES_OFF, 0),
            ]
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
