//! DeviceRegistry: one-shot, best-effort MIDI output acquisition.
//!
//! Each session asks the registry for a device exactly once, at handshake
//! time.  The policy is:
//!
//! 1. If a preferred name is configured, try it.  Failure is a warning.
//! 2. Try the system default output.  Failure is an error, but not fatal:
//!    the session continues without a device.
//! 3. Enumerate the visible outputs, whatever happened above, so the browser
//!    can still show what exists.
//!
//! There is no retry and no backoff.  The registry holds no open ports; every
//! [`DeviceHandle`] it produces is owned by exactly one session.

use std::fmt;
use std::sync::Arc;

use isokey_core::StatusMessage;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors raised by MIDI backends and device handles.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// The MIDI subsystem could not be initialised.
    #[error("MIDI backend initialisation failed: {0}")]
    Init(String),

    /// No output matches the requested name.
    #[error("MIDI output '{0}' not found")]
    NotFound(String),

    /// The system has no MIDI outputs at all.
    #[error("no MIDI outputs available")]
    NoOutputs,

    /// The output exists but could not be opened (busy, driver error, ...).
    #[error("failed to open MIDI output '{name}': {reason}")]
    Connect { name: String, reason: String },

    /// Writing a message to an open output failed.
    #[error("failed to write to MIDI output: {0}")]
    Send(String),

    /// MIDI output support is not compiled into this binary.
    #[error("MIDI output support is not available in this build")]
    Unavailable,

    /// The handle has already been closed.
    #[error("MIDI output is closed")]
    Closed,
}

/// Which output a backend should open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSelector<'a> {
    /// The output whose name matches (see [`find_output_index`]).
    Named(&'a str),
    /// The system default output: the first one enumerated.
    Default,
}

/// An open connection to one MIDI output, as provided by a backend.
pub trait OutputPort: Send {
    /// Writes one complete MIDI message.
    fn send(&mut self, message: &[u8]) -> Result<(), DeviceError>;

    /// Closes the connection, consuming the port.
    fn close(self: Box<Self>);
}

/// An output port plus the name the backend reported for it.
pub struct OpenedPort {
    /// Display name of the output, if the driver reported one.
    pub name: Option<String>,
    /// The live connection.
    pub port: Box<dyn OutputPort>,
}

/// Source of MIDI outputs: the system driver in production, a recording mock
/// in tests.
pub trait MidiBackend: Send + Sync {
    /// Names of all visible outputs, in enumeration order.
    fn output_names(&self) -> Result<Vec<String>, DeviceError>;

    /// Opens an output.
    fn open(&self, selector: PortSelector<'_>) -> Result<OpenedPort, DeviceError>;
}

/// Finds the output matching `wanted`.
///
/// An exact name match wins; otherwise the first name containing `wanted`
/// case-insensitively is used.  ALSA, for example, reports
/// `"Midi Through:Midi Through Port-0 14:0"` for what users call
/// `"Midi Through Port-0"`.
pub fn find_output_index(names: &[String], wanted: &str) -> Option<usize> {
    if wanted.is_empty() {
        return None;
    }
    names.iter().position(|n| n == wanted).or_else(|| {
        let needle = wanted.to_lowercase();
        names
            .iter()
            .position(|n| n.to_lowercase().contains(&needle))
    })
}

// ── DeviceHandle ──────────────────────────────────────────────────────────────

/// An exclusively owned, open MIDI output.
///
/// The port is closed at most once: by [`DeviceHandle::close`], or when the
/// handle is dropped while still open.  Closing a closed handle is a no-op.
pub struct DeviceHandle {
    name: Option<String>,
    port: Option<Box<dyn OutputPort>>,
}

impl DeviceHandle {
    /// Wraps a freshly opened port.
    pub fn new(opened: OpenedPort) -> Self {
        Self {
            name: opened.name,
            port: Some(opened.port),
        }
    }

    /// Name of the output, if known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// `true` until the handle is closed.
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Writes one MIDI message.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Closed`] after [`close`](Self::close), or the
    /// backend's error if the write fails.
    pub fn send(&mut self, message: &[u8]) -> Result<(), DeviceError> {
        match self.port.as_mut() {
            Some(port) => port.send(message),
            None => Err(DeviceError::Closed),
        }
    }

    /// Closes the output.  Returns `true` if this call closed it, `false` if
    /// it was already closed.
    pub fn close(&mut self) -> bool {
        match self.port.take() {
            Some(port) => {
                port.close();
                debug!(
                    "MIDI output {} closed",
                    self.name.as_deref().unwrap_or("<unnamed>")
                );
                true
            }
            None => false,
        }
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("name", &self.name)
            .field("is_open", &self.is_open())
            .finish()
    }
}

// ── Acquisition ───────────────────────────────────────────────────────────────

/// Result of [`DeviceRegistry::acquire`].
#[derive(Debug)]
pub struct Acquisition {
    /// The opened device, or `None` in degraded mode.
    pub handle: Option<DeviceHandle>,
    /// All visible output names, queried after the open attempts.
    pub outputs: Vec<String>,
}

impl Acquisition {
    /// The status frame to report to the browser.
    pub fn status(&self) -> StatusMessage {
        StatusMessage {
            connected: self.handle.is_some(),
            port: self
                .handle
                .as_ref()
                .and_then(|h| h.name().map(str::to_owned)),
            outputs: self.outputs.clone(),
        }
    }
}

/// Opens MIDI outputs for sessions.
///
/// Cheap to share: it only holds the backend.
#[derive(Clone)]
pub struct DeviceRegistry {
    backend: Arc<dyn MidiBackend>,
}

impl DeviceRegistry {
    /// Creates a registry over `backend`.
    pub fn new(backend: Arc<dyn MidiBackend>) -> Self {
        Self { backend }
    }

    /// Names of all visible outputs.  An enumeration failure is logged and
    /// reported as an empty list.
    pub fn output_names(&self) -> Vec<String> {
        match self.backend.output_names() {
            Ok(names) => names,
            Err(e) => {
                warn!("failed to enumerate MIDI outputs: {e}");
                Vec::new()
            }
        }
    }

    /// Acquires a device for one session: preferred name first, then the
    /// system default.
    ///
    /// Never fails.  When nothing can be opened the handle is `None` and the
    /// session runs in degraded mode.
    pub fn acquire(&self, preferred_name: &str) -> Acquisition {
        let handle = self
            .open_preferred(preferred_name)
            .or_else(|| self.open_default());
        let outputs = self.output_names();

        Acquisition { handle, outputs }
    }

    fn open_preferred(&self, preferred_name: &str) -> Option<DeviceHandle> {
        if preferred_name.is_empty() {
            return None;
        }
        match self.backend.open(PortSelector::Named(preferred_name)) {
            Ok(opened) => {
                let handle = DeviceHandle::new(opened);
                info!(
                    "opened preferred MIDI output {}",
                    handle.name().unwrap_or(preferred_name)
                );
                Some(handle)
            }
            Err(e) => {
                warn!("failed opening preferred MIDI output {preferred_name}: {e}");
                None
            }
        }
    }

    fn open_default(&self) -> Option<DeviceHandle> {
        match self.backend.open(PortSelector::Default) {
            Ok(opened) => {
                let handle = DeviceHandle::new(opened);
                info!(
                    "opened default MIDI output {}",
                    handle.name().unwrap_or("<unnamed>")
                );
                Some(handle)
            }
            Err(e) => {
                error!("failed opening default MIDI output: {e}");
                None
            }
        }
    }
}

impl fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRegistry").finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::midi_output::mock::MockMidiBackend;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    // ── find_output_index ─────────────────────────────────────────────────────

    #[test]
    fn test_find_output_prefers_exact_match() {
        let list = names(&["Synth Port-10", "Synth Port-1"]);
        assert_eq!(find_output_index(&list, "Synth Port-1"), Some(1));
    }

    #[test]
    fn test_find_output_falls_back_to_case_insensitive_substring() {
        let list = names(&["Midi Through:Midi Through Port-0 14:0", "FLUID Synth"]);
        assert_eq!(find_output_index(&list, "midi through port-0"), Some(0));
        assert_eq!(find_output_index(&list, "fluid"), Some(1));
    }

    #[test]
    fn test_find_output_empty_name_matches_nothing() {
        let list = names(&["A"]);
        assert_eq!(find_output_index(&list, ""), None);
    }

    #[test]
    fn test_find_output_missing_name() {
        let list = names(&["A", "B"]);
        assert_eq!(find_output_index(&list, "C"), None);
    }

    // ── acquire ───────────────────────────────────────────────────────────────

    #[test]
    fn test_acquire_opens_preferred_output() {
        // Arrange
        let backend = Arc::new(MockMidiBackend::with_outputs(&["Default Out", "Piano"]));
        let registry = DeviceRegistry::new(backend.clone());

        // Act
        let acq = registry.acquire("Piano");

        // Assert
        let handle = acq.handle.as_ref().expect("device must be open");
        assert_eq!(handle.name(), Some("Piano"));
        assert_eq!(acq.outputs, names(&["Default Out", "Piano"]));
        assert_eq!(*backend.log.opened.lock().unwrap(), names(&["Piano"]));
    }

    #[test]
    fn test_acquire_without_preference_opens_default() {
        let backend = Arc::new(MockMidiBackend::with_outputs(&["Default Out", "Piano"]));
        let registry = DeviceRegistry::new(backend);

        let acq = registry.acquire("");

        assert_eq!(acq.handle.as_ref().and_then(|h| h.name()), Some("Default Out"));
    }

    #[test]
    fn test_acquire_missing_preferred_falls_back_to_default() {
        let backend = Arc::new(MockMidiBackend::with_outputs(&["Default Out"]));
        let registry = DeviceRegistry::new(backend);

        let acq = registry.acquire("Not Plugged In");

        assert_eq!(acq.handle.as_ref().and_then(|h| h.name()), Some("Default Out"));
    }

    #[test]
    fn test_acquire_busy_preferred_falls_back_to_default() {
        // Arrange: the preferred port exists but refuses to open
        let mut backend = MockMidiBackend::with_outputs(&["Default Out", "Piano"]);
        backend.busy = names(&["Piano"]);
        let registry = DeviceRegistry::new(Arc::new(backend));

        // Act
        let acq = registry.acquire("Piano");

        // Assert
        assert_eq!(acq.handle.as_ref().and_then(|h| h.name()), Some("Default Out"));
    }

    #[test]
    fn test_acquire_total_failure_reports_disconnected_with_outputs() {
        // Arrange: both the preferred and the default open fail
        let mut backend = MockMidiBackend::with_outputs(&["A", "B"]);
        backend.busy = names(&["A", "B"]);
        let registry = DeviceRegistry::new(Arc::new(backend));

        // Act
        let acq = registry.acquire("B");
        let status = acq.status();

        // Assert: degraded mode, but every visible name is still listed
        assert!(acq.handle.is_none());
        assert!(!status.connected);
        assert_eq!(status.port, None);
        assert_eq!(status.outputs, names(&["A", "B"]));
    }

    #[test]
    fn test_acquire_default_failure_without_preference_is_degraded() {
        // Arrange: the default output is listed but cannot be opened
        let mut backend = MockMidiBackend::with_outputs(&["Default Out", "Piano"]);
        backend.fail_default = true;
        let backend = Arc::new(backend);
        let registry = DeviceRegistry::new(backend.clone());

        // Act
        let acq = registry.acquire("");

        // Assert: no fallback beyond the default is tried
        assert!(acq.handle.is_none());
        assert!(!acq.status().connected);
        assert_eq!(acq.outputs, names(&["Default Out", "Piano"]));
        assert!(backend.log.opened.lock().unwrap().is_empty());
    }

    #[test]
    fn test_acquire_preferred_succeeds_when_default_is_broken() {
        let mut backend = MockMidiBackend::with_outputs(&["Default Out", "Piano"]);
        backend.fail_default = true;
        let registry = DeviceRegistry::new(Arc::new(backend));

        let acq = registry.acquire("piano");

        assert_eq!(acq.handle.as_ref().and_then(|h| h.name()), Some("Piano"));
    }

    #[test]
    fn test_acquire_with_no_outputs_is_degraded() {
        let registry = DeviceRegistry::new(Arc::new(MockMidiBackend::with_outputs(&[])));

        let acq = registry.acquire("");

        assert!(acq.handle.is_none());
        assert!(acq.outputs.is_empty());
    }

    #[test]
    fn test_enumeration_failure_yields_empty_outputs() {
        let mut backend = MockMidiBackend::with_outputs(&["A"]);
        backend.fail_enumeration = true;
        let registry = DeviceRegistry::new(Arc::new(backend));

        let acq = registry.acquire("");

        // The open still succeeds; only the listing is lost.
        assert!(acq.handle.is_some());
        assert!(acq.outputs.is_empty());
    }

    #[test]
    fn test_status_reports_connected_port_name() {
        let registry = DeviceRegistry::new(Arc::new(MockMidiBackend::with_outputs(&["A"])));

        let status = registry.acquire("").status();

        assert!(status.connected);
        assert_eq!(status.port.as_deref(), Some("A"));
    }

    // ── DeviceHandle ──────────────────────────────────────────────────────────

    #[test]
    fn test_handle_double_close_is_safe() {
        // Arrange
        let backend = Arc::new(MockMidiBackend::with_outputs(&["A"]));
        let registry = DeviceRegistry::new(backend.clone());
        let mut handle = registry.acquire("").handle.unwrap();

        // Act
        let first = handle.close();
        let second = handle.close();
        drop(handle);

        // Assert: closed exactly once across close, close, drop
        assert!(first);
        assert!(!second);
        assert_eq!(backend.log.close_count("A"), 1);
    }

    #[test]
    fn test_handle_drop_closes_open_port() {
        let backend = Arc::new(MockMidiBackend::with_outputs(&["A"]));
        let registry = DeviceRegistry::new(backend.clone());

        drop(registry.acquire(""));

        assert_eq!(backend.log.close_count("A"), 1);
    }

    #[test]
    fn test_send_after_close_is_rejected() {
        let backend = Arc::new(MockMidiBackend::with_outputs(&["A"]));
        let registry = DeviceRegistry::new(backend.clone());
        let mut handle = registry.acquire("").handle.unwrap();

        handle.close();

        assert!(!handle.is_open());
        assert_eq!(handle.send(&[0x90, 60, 100]), Err(DeviceError::Closed));
        assert!(backend.log.sent_bytes().is_empty());
    }

    #[test]
    fn test_send_reaches_the_port() {
        let backend = Arc::new(MockMidiBackend::with_outputs(&["A"]));
        let registry = DeviceRegistry::new(backend.clone());
        let mut handle = registry.acquire("").handle.unwrap();

        handle.send(&[0x90, 64, 90]).unwrap();

        assert_eq!(backend.log.sent_bytes(), vec![vec![0x90, 64, 90]]);
    }
}
