//! Application layer for isokey-bridge.
//!
//! Knows *what* a session does (acquire a device, report status, forward
//! commands, release) but not *how* bytes reach a socket or a MIDI driver.
//! Those seams are the [`FrameTransport`] and [`MidiBackend`] traits, which
//! the infrastructure layer implements.

pub mod connection_bridge;
pub mod device_registry;
pub mod transport;

pub use connection_bridge::{ConnectionBridge, ConnectionSession};
pub use device_registry::{
    Acquisition, DeviceError, DeviceHandle, DeviceRegistry, MidiBackend, OpenedPort, OutputPort,
    PortSelector,
};
pub use transport::{FrameTransport, TransportError};
