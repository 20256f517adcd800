//! MIDI output backends.
//!
//! | Backend              | When                                  |
//! |----------------------|---------------------------------------|
//! | `MidirBackend`       | `midi-io` feature enabled (default)   |
//! | `UnavailableBackend` | built without `midi-io`               |
//! | `MockMidiBackend`    | tests                                 |

use std::sync::Arc;

use crate::application::device_registry::{DeviceError, MidiBackend, OpenedPort, PortSelector};

#[cfg(feature = "midi-io")]
pub mod midir_backend;
pub mod mock;

#[cfg(feature = "midi-io")]
pub use midir_backend::MidirBackend;

/// Stand-in backend for builds without hardware MIDI support.
///
/// Lists no outputs and refuses every open, so sessions run in degraded mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBackend;

impl MidiBackend for UnavailableBackend {
    fn output_names(&self) -> Result<Vec<String>, DeviceError> {
        Ok(Vec::new())
    }

    fn open(&self, _selector: PortSelector<'_>) -> Result<OpenedPort, DeviceError> {
        Err(DeviceError::Unavailable)
    }
}

/// The backend for the real system MIDI subsystem in this build.
pub fn system_backend() -> Arc<dyn MidiBackend> {
    #[cfg(feature = "midi-io")]
    {
        Arc::new(MidirBackend::new())
    }
    #[cfg(not(feature = "midi-io"))]
    {
        Arc::new(UnavailableBackend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::DeviceRegistry;

    #[test]
    fn test_unavailable_backend_yields_degraded_acquisition() {
        // Arrange
        let registry = DeviceRegistry::new(Arc::new(UnavailableBackend));

        // Act
        let acq = registry.acquire("anything");

        // Assert
        assert!(acq.handle.is_none());
        assert!(acq.outputs.is_empty());
        assert!(!acq.status().connected);
    }

    #[test]
    fn test_unavailable_backend_open_error() {
        let err = UnavailableBackend.open(PortSelector::Default).err();
        assert_eq!(err, Some(DeviceError::Unavailable));
    }
}
