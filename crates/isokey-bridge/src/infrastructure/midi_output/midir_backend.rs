//! MIDI output through midir (ALSA, CoreMIDI, WinMM).
//!
//! midir's `connect` consumes the `MidiOutput` client, so every open creates
//! a fresh client.  That also gives each session its own connection, which is
//! what [`DeviceRegistry`](crate::application::DeviceRegistry) expects.

use midir::{MidiOutput, MidiOutputConnection};
use tracing::debug;

use crate::application::device_registry::{
    find_output_index, DeviceError, MidiBackend, OpenedPort, OutputPort, PortSelector,
};

const CLIENT_NAME: &str = "isokey-bridge";
const CONNECTION_NAME: &str = "isokey-bridge-out";

/// The system MIDI subsystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct MidirBackend;

impl MidirBackend {
    pub fn new() -> Self {
        Self
    }

    fn client() -> Result<MidiOutput, DeviceError> {
        MidiOutput::new(CLIENT_NAME).map_err(|e| DeviceError::Init(e.to_string()))
    }

    fn names(client: &MidiOutput) -> Vec<String> {
        client
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                client
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {index}"))
            })
            .collect()
    }
}

impl MidiBackend for MidirBackend {
    fn output_names(&self) -> Result<Vec<String>, DeviceError> {
        let client = Self::client()?;
        Ok(Self::names(&client))
    }

    fn open(&self, selector: PortSelector<'_>) -> Result<OpenedPort, DeviceError> {
        let client = Self::client()?;
        let ports = client.ports();
        let names = Self::names(&client);

        let index = match selector {
            PortSelector::Named(wanted) => find_output_index(&names, wanted)
                .ok_or_else(|| DeviceError::NotFound(wanted.to_string()))?,
            PortSelector::Default if ports.is_empty() => return Err(DeviceError::NoOutputs),
            PortSelector::Default => 0,
        };
        let (port, name) = match (ports.get(index), names.get(index)) {
            (Some(port), Some(name)) => (port, name.clone()),
            _ => return Err(DeviceError::NoOutputs),
        };

        debug!("connecting to MIDI output {name}");
        let connection = client
            .connect(port, CONNECTION_NAME)
            .map_err(|e| DeviceError::Connect {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        Ok(OpenedPort {
            name: Some(name),
            port: Box::new(MidirPort { connection }),
        })
    }
}

struct MidirPort {
    connection: MidiOutputConnection,
}

impl OutputPort for MidirPort {
    fn send(&mut self, message: &[u8]) -> Result<(), DeviceError> {
        self.connection
            .send(message)
            .map_err(|e| DeviceError::Send(e.to_string()))
    }

    fn close(self: Box<Self>) {
        // Dropping the returned client releases the driver handle as well.
        let _client = self.connection.close();
    }
}
