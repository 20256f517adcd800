//! IsoKey MIDI bridge: entry point.
//!
//! Serves the browser keyboard and forwards its notes to a MIDI output.
//! The browser page and the WebSocket endpoint share one port:
//!
//! ```text
//! http://HOST:PORT/      the keyboard page (index document)
//! http://HOST:PORT/<f>   other files from the web root
//! ws://HOST:PORT/ws      JSON note stream → MIDI
//! ```
//!
//! # Usage
//!
//! ```text
//! isokey-bridge [OPTIONS]
//!
//! Options:
//!   --host <ADDR>         Listener address [default: 0.0.0.0]
//!   --port <PORT>         Listener port [default: 5000]
//!   --midi-port <NAME>    MIDI output to try before the system default
//!                         [default: Python MIDI 1; "" for none]
//!   --channel <0-15>      MIDI channel for notes and pitch bend [default: 0]
//!   --web-root <DIR>      Directory served over HTTP [default: .]
//!   --index-file <FILE>   Document served for `/`
//!                         [default: isomorphic_keyboard_synth_single_html.html]
//!   --list-outputs        Print the visible MIDI outputs and exit
//! ```
//!
//! Every option except `--list-outputs` also reads an environment variable
//! (`ISOKEY_HOST`, `ISOKEY_PORT`, `ISOKEY_MIDI_PORT`, `ISOKEY_MIDI_CHANNEL`,
//! `ISOKEY_WEB_ROOT`, `ISOKEY_INDEX_FILE`).  CLI args take precedence.
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use isokey_bridge::application::DeviceRegistry;
use isokey_bridge::domain::config::{DEFAULT_INDEX_FILE, DEFAULT_PREFERRED_OUTPUT};
use isokey_bridge::domain::BridgeConfig;
use isokey_bridge::infrastructure::{run_server, system_backend};
use isokey_core::protocol::wire::MAX_CHANNEL;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// WebSocket-to-MIDI bridge for the IsoKey browser keyboard.
#[derive(Debug, Parser)]
#[command(
    name = "isokey-bridge",
    about = "Serves the IsoKey browser keyboard and forwards its notes to a MIDI output",
    version
)]
struct Cli {
    /// IP address to bind to.
    ///
    /// `0.0.0.0` accepts connections from the LAN (tablets, phones);
    /// `127.0.0.1` keeps the bridge local.
    #[arg(long, default_value = "0.0.0.0", env = "ISOKEY_HOST")]
    host: String,

    /// TCP port for both HTTP and WebSocket.
    #[arg(long, default_value_t = 5000, env = "ISOKEY_PORT")]
    port: u16,

    /// Name (or part of the name) of the MIDI output to prefer.
    ///
    /// Pass an empty string to go straight to the system default output.
    #[arg(long, default_value = DEFAULT_PREFERRED_OUTPUT, env = "ISOKEY_MIDI_PORT")]
    midi_port: String,

    /// MIDI channel, 0-15, for notes and pitch bend.
    #[arg(
        long,
        default_value_t = 0,
        env = "ISOKEY_MIDI_CHANNEL",
        value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_CHANNEL))
    )]
    channel: u8,

    /// Directory holding the browser client.
    #[arg(long, default_value = ".", env = "ISOKEY_WEB_ROOT")]
    web_root: PathBuf,

    /// File served for `/`, relative to the web root.
    #[arg(long, default_value = DEFAULT_INDEX_FILE, env = "ISOKEY_INDEX_FILE")]
    index_file: String,

    /// Print the visible MIDI outputs and exit.
    #[arg(long)]
    list_outputs: bool,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--host` is not an IP address or `--channel` is
    /// out of range.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("invalid listener address: '{}'", self.host))?;

        anyhow::ensure!(
            self.channel <= MAX_CHANNEL,
            "MIDI channel must be 0-{MAX_CHANNEL}, got {}",
            self.channel
        );

        let midi_port = self.midi_port.trim();
        let preferred_output = (!midi_port.is_empty()).then(|| midi_port.to_string());

        Ok(BridgeConfig {
            bind_addr: SocketAddr::new(ip, self.port),
            preferred_output,
            midi_channel: self.channel,
            web_root: self.web_root,
            index_file: self.index_file,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let list_outputs = cli.list_outputs;
    let config = cli.into_bridge_config()?;
    let backend = system_backend();

    if list_outputs {
        let outputs = DeviceRegistry::new(backend).output_names();
        if outputs.is_empty() {
            println!("no MIDI outputs found");
        }
        for (index, name) in outputs.iter().enumerate() {
            println!("{index}: {name}");
        }
        return Ok(());
    }

    info!(
        "IsoKey bridge starting: addr={}, midi_port={}, channel={}, web_root={}",
        config.bind_addr,
        config.preferred_output.as_deref().unwrap_or("<default>"),
        config.midi_channel,
        config.web_root.display()
    );

    // Cleared by Ctrl+C; the server polls it every 200 ms.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, backend, running).await?;

    info!("IsoKey bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(host: &str, channel: u8) -> Cli {
        Cli {
            host: host.to_string(),
            port: 5000,
            midi_port: String::new(),
            channel,
            web_root: PathBuf::from("."),
            index_file: "index.html".to_string(),
            list_outputs: false,
        }
    }

    #[test]
    fn test_cli_defaults() {
        // Arrange: parse with no arguments (all defaults apply)
        let cli = Cli::parse_from(["isokey-bridge"]);

        // Assert
        assert_eq!(cli.host, "0.0.0.0");
        assert_eq!(cli.port, 5000);
        assert_eq!(cli.midi_port, "Python MIDI 1");
        assert_eq!(cli.channel, 0);
        assert_eq!(cli.web_root, PathBuf::from("."));
        assert_eq!(cli.index_file, "isomorphic_keyboard_synth_single_html.html");
        assert!(!cli.list_outputs);
    }

    #[test]
    fn test_cli_port_override() {
        let cli = Cli::parse_from(["isokey-bridge", "--port", "8080"]);
        assert_eq!(cli.port, 8080);
    }

    #[test]
    fn test_cli_midi_port_override() {
        let cli = Cli::parse_from(["isokey-bridge", "--midi-port", "loopMIDI Port"]);
        assert_eq!(cli.midi_port, "loopMIDI Port");
    }

    #[test]
    fn test_cli_empty_midi_port_disables_preference() {
        // Arrange
        let cli = Cli::parse_from(["isokey-bridge", "--midi-port", ""]);

        // Act
        let config = cli.into_bridge_config().unwrap();

        // Assert
        assert_eq!(config.preferred_output, None);
    }

    #[test]
    fn test_cli_channel_bound_matches_wire_limit() {
        let top = MAX_CHANNEL.to_string();
        let cli = Cli::parse_from(["isokey-bridge", "--channel", top.as_str()]);
        assert_eq!(cli.channel, MAX_CHANNEL);
    }

    #[test]
    fn test_cli_channel_out_of_range_is_rejected() {
        let result = Cli::try_parse_from(["isokey-bridge", "--channel", "16"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_list_outputs_flag() {
        let cli = Cli::parse_from(["isokey-bridge", "--list-outputs"]);
        assert!(cli.list_outputs);
    }

    #[test]
    fn test_into_bridge_config_defaults_match_domain_defaults() {
        // Arrange
        let cli = Cli::parse_from(["isokey-bridge"]);
        let expected = BridgeConfig::default();

        // Act
        let config = cli.into_bridge_config().unwrap();

        // Assert
        assert_eq!(config.bind_addr, expected.bind_addr);
        assert_eq!(config.preferred_output, expected.preferred_output);
        assert_eq!(config.midi_channel, expected.midi_channel);
        assert_eq!(config.web_root, expected.web_root);
        assert_eq!(config.index_file, expected.index_file);
    }

    #[test]
    fn test_into_bridge_config_custom_values() {
        let cli = Cli::parse_from([
            "isokey-bridge",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--midi-port",
            " loopMIDI Port ",
            "--channel",
            "9",
            "--web-root",
            "/srv/isokey",
        ]);

        let config = cli.into_bridge_config().unwrap();

        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.preferred_output.as_deref(), Some("loopMIDI Port"));
        assert_eq!(config.midi_channel, 9);
        assert_eq!(config.web_root, PathBuf::from("/srv/isokey"));
    }

    #[test]
    fn test_into_bridge_config_accepts_ipv6() {
        let config = cli("::1", 0).into_bridge_config().unwrap();
        assert_eq!(config.bind_addr.to_string(), "[::1]:5000");
    }

    #[test]
    fn test_into_bridge_config_blank_midi_port_means_default() {
        let mut args = cli("0.0.0.0", 0);
        args.midi_port = "   ".to_string();

        let config = args.into_bridge_config().unwrap();

        assert_eq!(config.preferred_output, None);
    }

    #[test]
    fn test_into_bridge_config_invalid_host_returns_error() {
        // Arrange: provide an invalid IP address string
        let args = cli("not.an.ip", 0);

        // Act
        let result = args.into_bridge_config();

        // Assert: must return an error, not panic
        assert!(result.is_err());
    }

    #[test]
    fn test_into_bridge_config_invalid_channel_returns_error() {
        let result = cli("0.0.0.0", 16).into_bridge_config();
        assert!(result.is_err());
    }
}
