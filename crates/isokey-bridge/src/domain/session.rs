//! Per-connection session state.
//!
//! Every WebSocket connection walks the same one-way path:
//!
//! ```text
//! Handshake ──► Active ──► Closed
//!     └───────────────────────▲
//! ```
//!
//! `Closed` is terminal; a session never resumes.  Skipping `Active` is
//! allowed so a session torn down during the handshake still ends cleanly.

use std::fmt;

use uuid::Uuid;

/// The lifecycle state of one bridge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Acquiring a device and sending the status frame.
    Handshake,
    /// Forwarding browser commands to the device.
    Active,
    /// Device released; no further frames are processed.
    Closed,
}

impl SessionState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Handshake, SessionState::Active)
                | (SessionState::Handshake, SessionState::Closed)
                | (SessionState::Active, SessionState::Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Handshake => "handshake",
            SessionState::Active => "active",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Counters kept while a session is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Text frames received from the browser.
    pub frames_received: u64,
    /// MIDI messages successfully written to the device.
    pub messages_sent: u64,
    /// Frames that produced no output: malformed, unknown, or no device open.
    pub frames_dropped: u64,
    /// Device writes that failed.
    pub device_errors: u64,
}

/// Summary of a finished session, logged by the server when it closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Session identifier used in every log line of the session.
    pub session_id: Uuid,
    /// Name of the device the session used, if one was opened.
    pub device_name: Option<String>,
    /// Final counters.
    pub stats: SessionStats,
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "device={} frames={} sent={} dropped={} device_errors={}",
            self.device_name.as_deref().unwrap_or("<none>"),
            self.stats.frames_received,
            self.stats.messages_sent,
            self.stats.frames_dropped,
            self.stats.device_errors,
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
