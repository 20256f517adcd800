//! Recording MIDI backend for tests.
//!
//! `MockMidiBackend` pretends to be a MIDI subsystem with a fixed list of
//! outputs.  Every open, write, and close is pushed into a shared
//! [`MockMidiLog`] so tests can assert exactly what reached the "hardware"
//! and how many times each port was released.
//!
//! ```ignore
//! let backend = Arc::new(MockMidiBackend::with_outputs(&["Synth"]));
//! let registry = DeviceRegistry::new(backend.clone());
//!
//! let mut handle = registry.acquire("").handle.unwrap();
//! handle.send(&[0x90, 60, 100]).unwrap();
//! drop(handle);
//!
//! assert_eq!(backend.log.sent_bytes(), vec![vec![0x90, 60, 100]]);
//! assert_eq!(backend.log.close_count("Synth"), 1);
//! ```
//!
//! # Failure flags
//!
//! - `busy`: outputs that are listed but refuse to open.
//! - `fail_default`: opening the default output fails.
//! - `fail_enumeration`: listing outputs fails.
//! - `should_fail_sends`: every write on ports opened afterwards fails.

use std::sync::{Arc, Mutex};

use crate::application::device_registry::{
    find_output_index, DeviceError, MidiBackend, OpenedPort, OutputPort, PortSelector,
};

/// Everything the mock observed.  Shared between the backend and its ports.
#[derive(Debug, Default)]
pub struct MockMidiLog {
    /// Names of ports opened, in order.
    pub opened: Mutex<Vec<String>>,
    /// Every write attempt as `(port, bytes)`, including failed ones.
    pub attempted: Mutex<Vec<(String, Vec<u8>)>>,
    /// Successful writes as `(port, bytes)`.
    pub sent: Mutex<Vec<(String, Vec<u8>)>>,
    /// Names of ports closed, in order.
    pub closed: Mutex<Vec<String>>,
}

impl MockMidiLog {
    /// Bytes of every successful write, in order, regardless of port.
    pub fn sent_bytes(&self) -> Vec<Vec<u8>> {
        lock(&self.sent).iter().map(|(_, b)| b.clone()).collect()
    }

    /// Number of write attempts, successful or not.
    pub fn attempt_count(&self) -> usize {
        lock(&self.attempted).len()
    }

    /// How many times the port called `name` was closed.
    pub fn close_count(&self, name: &str) -> usize {
        lock(&self.closed).iter().filter(|n| *n == name).count()
    }

    /// Total number of closes across all ports.
    pub fn total_closes(&self) -> usize {
        lock(&self.closed).len()
    }
}

// A test that panicked while holding a lock must not hide the log from the
// remaining assertions.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A fake MIDI subsystem.
#[derive(Debug, Default)]
pub struct MockMidiBackend {
    /// Visible output names, in enumeration order.  The first is the default.
    pub outputs: Vec<String>,
    /// Outputs that are listed but fail to open.
    pub busy: Vec<String>,
    /// When `true`, `open(PortSelector::Default)` fails.
    pub fail_default: bool,
    /// When `true`, `output_names` fails.
    pub fail_enumeration: bool,
    /// When `true`, ports opened from now on fail every write.
    pub should_fail_sends: bool,
    /// Shared record of everything that happened.
    pub log: Arc<MockMidiLog>,
}

impl MockMidiBackend {
    /// Creates a backend exposing `names` with no failures configured.
    pub fn with_outputs(names: &[&str]) -> Self {
        Self {
            outputs: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    fn connect(&self, name: &str) -> Result<OpenedPort, DeviceError> {
        if self.busy.iter().any(|b| b == name) {
            return Err(DeviceError::Connect {
                name: name.to_string(),
                reason: "port busy".to_string(),
            });
        }
        lock(&self.log.opened).push(name.to_string());
        Ok(OpenedPort {
            name: Some(name.to_string()),
            port: Box::new(MockPort {
                name: name.to_string(),
                log: Arc::clone(&self.log),
                should_fail: self.should_fail_sends,
            }),
        })
    }
}

impl MidiBackend for MockMidiBackend {
    fn output_names(&self) -> Result<Vec<String>, DeviceError> {
        if self.fail_enumeration {
            return Err(DeviceError::Init("mock enumeration failure".to_string()));
        }
        Ok(self.outputs.clone())
    }

    fn open(&self, selector: PortSelector<'_>) -> Result<OpenedPort, DeviceError> {
        match selector {
            PortSelector::Named(wanted) => {
                let index = find_output_index(&self.outputs, wanted)
                    .ok_or_else(|| DeviceError::NotFound(wanted.to_string()))?;
                self.connect(&self.outputs[index])
            }
            PortSelector::Default => {
                if self.fail_default {
                    return Err(DeviceError::Connect {
                        name: "default".to_string(),
                        reason: "mock default failure".to_string(),
                    });
                }
                let first = self.outputs.first().ok_or(DeviceError::NoOutputs)?;
                self.connect(first)
            }
        }
    }
}

struct MockPort {
    name: String,
    log: Arc<MockMidiLog>,
    should_fail: bool,
}

impl OutputPort for MockPort {
    fn send(&mut self, message: &[u8]) -> Result<(), DeviceError> {
        lock(&self.log.attempted).push((self.name.clone(), message.to_vec()));
        if self.should_fail {
            return Err(DeviceError::Send("mock write failure".to_string()));
        }
        lock(&self.log.sent).push((self.name.clone(), message.to_vec()));
        Ok(())
    }

    fn close(self: Box<Self>) {
        lock(&self.log.closed).push(self.name.clone());
    }
}
