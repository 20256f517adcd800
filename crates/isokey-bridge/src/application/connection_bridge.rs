//! The per-connection state machine.
//!
//! One [`ConnectionBridge`] exists per browser connection.  It owns the
//! transport and, for the whole session, at most one MIDI device:
//!
//! 1. **Handshake**: acquire a device and send one status frame.
//! 2. **Active**: decode each text frame and write the resulting MIDI
//!    messages to the device.  Nothing is ever sent back.
//! 3. **Closed**: release the device exactly once and close the transport.
//!
//! Device problems never end a session.  Only the transport ending (cleanly
//! or with an error) moves the session to `Closed`.

use isokey_core::{encode_command, encode_status, try_decode_frame};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::device_registry::{DeviceHandle, DeviceRegistry};
use crate::application::transport::FrameTransport;
use crate::domain::session::{SessionReport, SessionState, SessionStats};

// ── ConnectionSession ─────────────────────────────────────────────────────────

/// Mutable state of one connection.  Never shared between tasks.
#[derive(Debug)]
pub struct ConnectionSession {
    id: Uuid,
    peer: String,
    state: SessionState,
    device: Option<DeviceHandle>,
    device_name: Option<String>,
    stats: SessionStats,
}

impl ConnectionSession {
    /// Creates a session in the `Handshake` state with a fresh v4 id.
    pub fn new(peer: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer: peer.into(),
            state: SessionState::Handshake,
            device: None,
            device_name: None,
            stats: SessionStats::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// `true` while a device is attached and open.
    pub fn has_device(&self) -> bool {
        self.device.as_ref().is_some_and(DeviceHandle::is_open)
    }

    fn attach_device(&mut self, handle: Option<DeviceHandle>) {
        self.device_name = handle.as_ref().and_then(|h| h.name().map(str::to_owned));
        self.device = handle;
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition_to(next) {
            warn!(
                "session {}: ignoring illegal transition {} -> {next}",
                self.id, self.state
            );
            return;
        }
        debug!("session {}: {} -> {next}", self.id, self.state);
        self.state = next;
    }

    /// Takes the device out of the session and closes it.  Returns `true` if
    /// a device was released by this call.
    fn release_device(&mut self) -> bool {
        match self.device.take() {
            Some(mut handle) => handle.close(),
            None => false,
        }
    }

    fn report(&self) -> SessionReport {
        SessionReport {
            session_id: self.id,
            device_name: self.device_name.clone(),
            stats: self.stats,
        }
    }
}

// ── ConnectionBridge ──────────────────────────────────────────────────────────

/// Drives one session from handshake to close over a [`FrameTransport`].
pub struct ConnectionBridge<T: FrameTransport> {
    transport: T,
    session: ConnectionSession,
    channel: u8,
    preferred_output: String,
}

impl<T: FrameTransport> ConnectionBridge<T> {
    /// Creates a bridge for a freshly upgraded connection.
    ///
    /// `channel` is the MIDI channel (`0..=15`) for notes and pitch bend;
    /// `preferred_output` may be empty to go straight to the default output.
    pub fn new(
        transport: T,
        peer: impl Into<String>,
        channel: u8,
        preferred_output: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            session: ConnectionSession::new(peer),
            channel,
            preferred_output: preferred_output.into(),
        }
    }

    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    /// Runs the whole session and returns its summary once the transport has
    /// closed and the device has been released.
    pub async fn run(mut self, registry: &DeviceRegistry) -> SessionReport {
        self.handshake(registry).await;
        self.session.transition(SessionState::Active);
        self.pump_frames().await;
        self.close().await
    }

    async fn handshake(&mut self, registry: &DeviceRegistry) {
        let id = self.session.id;
        info!("session {id}: browser connected from {}", self.session.peer);

        let acquisition = registry.acquire(&self.preferred_output);
        let status = acquisition.status();
        self.session.attach_device(acquisition.handle);

        match &status.port {
            Some(port) => info!("session {id}: using MIDI output {port}"),
            None => warn!("session {id}: no MIDI output available; frames will be dropped"),
        }

        let frame = match encode_status(&status) {
            Ok(text) => text,
            Err(e) => {
                warn!("session {id}: failed to encode status frame: {e}");
                return;
            }
        };
        debug!("session {id}: sending {frame}");
        if let Err(e) = self.transport.send_frame(frame).await {
            warn!("session {id}: failed to send status frame: {e}");
        }
    }

    async fn pump_frames(&mut self) {
        let id = self.session.id;
        loop {
            match self.transport.receive_frame().await {
                Ok(Some(text)) => self.handle_frame(&text),
                Ok(None) => {
                    debug!("session {id}: transport closed by peer");
                    break;
                }
                Err(e) => {
                    warn!("session {id}: {e}");
                    break;
                }
            }
        }
    }

    /// Decodes one frame and writes its MIDI messages to the device.
    fn handle_frame(&mut self, raw: &str) {
        let id = self.session.id;
        self.session.stats.frames_received += 1;

        let command = match try_decode_frame(raw) {
            Ok(command) => command,
            Err(e) => {
                debug!("session {id}: dropping frame: {e}");
                self.session.stats.frames_dropped += 1;
                return;
            }
        };
        if !command.is_actionable() {
            debug!("session {id}: ignoring unsupported frame");
            self.session.stats.frames_dropped += 1;
            return;
        }

        let Some(device) = self.session.device.as_mut() else {
            debug!("session {id}: no device open, dropping {}", command.kind_name());
            self.session.stats.frames_dropped += 1;
            return;
        };

        // Each message is written independently so one failure inside the
        // panic sequence does not stop the rest of it.
        for message in encode_command(&command, self.channel) {
            match device.send(message.as_bytes()) {
                Ok(()) => self.session.stats.messages_sent += 1,
                Err(e) => {
                    warn!("session {id}: {} write failed: {e}", command.kind_name());
                    self.session.stats.device_errors += 1;
                }
            }
        }
    }

    async fn close(mut self) -> SessionReport {
        let id = self.session.id;
        self.session.transition(SessionState::Closed);
        if self.session.release_device() {
            info!("session {id}: released MIDI output");
        }
        self.transport.shutdown().await;

        let report = self.session.report();
        info!("session {id}: closed ({report})");
        report
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
