//! Bridge configuration types.
//!
//! [`BridgeConfig`] holds every runtime setting.  It is populated from CLI
//! arguments and environment variables in `main.rs`; the domain never reads
//! the environment itself, so tests can build one directly.

use std::net::SocketAddr;
use std::path::PathBuf;

/// MIDI output tried before the system default unless configured otherwise.
pub const DEFAULT_PREFERRED_OUTPUT: &str = "Python MIDI 1";

/// Document served for `/` unless configured otherwise.
pub const DEFAULT_INDEX_FILE: &str = "isomorphic_keyboard_synth_single_html.html";

/// All runtime configuration for the bridge.
///
/// Build this once at startup and wrap it in an `Arc` so every session task
/// can share it.
///
/// # Example
///
/// ```rust
/// use isokey_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 5000);
/// assert_eq!(cfg.preferred_output_name(), "Python MIDI 1");
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Address the HTTP/WebSocket listener binds to.
    pub bind_addr: SocketAddr,

    /// Name of the MIDI output to try before the system default.
    ///
    /// `None` skips straight to the default output.
    pub preferred_output: Option<String>,

    /// MIDI channel (`0..=15`) used for notes and pitch bend.
    pub midi_channel: u8,

    /// Directory the browser client is served from.
    pub web_root: PathBuf,

    /// Document served for `/`, relative to `web_root`.
    pub index_file: String,
}

impl BridgeConfig {
    /// The preferred output name as the device registry expects it: empty
    /// when no preference is configured.
    pub fn preferred_output_name(&self) -> &str {
        self.preferred_output.as_deref().unwrap_or("")
    }
}

impl Default for BridgeConfig {
    /// | Field            | Default                                        |
    /// |------------------|------------------------------------------------|
    /// | bind_addr        | `0.0.0.0:5000`                                 |
    /// | preferred_output | `Python MIDI 1`                                |
    /// | midi_channel     | 0                                              |
    /// | web_root         | `.`                                            |
    /// | index_file       | `isomorphic_keyboard_synth_single_html.html`   |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            preferred_output: Some(DEFAULT_PREFERRED_OUTPUT.to_string()),
            midi_channel: 0,
            web_root: PathBuf::from("."),
            index_file: DEFAULT_INDEX_FILE.to_string(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_is_5000() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.bind_addr.port(), 5000);
    }

    #[test]
    fn test_default_binds_all_interfaces() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.bind_addr.ip().to_string(), "0.0.0.0");
    }

    #[test]
    fn test_default_channel_is_zero() {
        assert_eq!(BridgeConfig::default().midi_channel, 0);
    }

    #[test]
    fn test_default_index_file() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.index_file, "isomorphic_keyboard_synth_single_html.html");
        assert_eq!(cfg.web_root, PathBuf::from("."));
    }

    #[test]
    fn test_default_prefers_python_midi_output() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.preferred_output.as_deref(), Some("Python MIDI 1"));
    }

    #[test]
    fn test_preferred_output_name_is_empty_without_preference() {
        let cfg = BridgeConfig {
            preferred_output: None,
            ..BridgeConfig::default()
        };
        assert_eq!(cfg.preferred_output_name(), "");
    }

    #[test]
    fn test_preferred_output_name_returns_configured_name() {
        // Arrange
        let cfg = BridgeConfig {
            preferred_output: Some("loopMIDI Port".to_string()),
            ..BridgeConfig::default()
        };

        // Act / Assert
        assert_eq!(cfg.preferred_output_name(), "loopMIDI Port");
    }
}
