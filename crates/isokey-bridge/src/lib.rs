//! isokey-bridge library crate.
//!
//! Bridges a browser keyboard (JSON over WebSocket) to a MIDI output device.
//! Each WebSocket connection gets its own session that owns one device for
//! its whole lifetime.
//!
//! # Architecture
//!
//! ```text
//! Browser (JSON over WebSocket)
//!         ↕
//! [isokey-bridge]
//!   ├── domain/           BridgeConfig, session state and report
//!   ├── application/      DeviceRegistry, FrameTransport, ConnectionBridge
//!   └── infrastructure/
//!         ├── ws_server/    axum router: static files, WebSocket upgrade
//!         ├── ws_transport/ FrameTransport over the upgraded socket
//!         └── midi_output/  midir backend (+ mock for tests)
//!         ↕
//! MIDI output device
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O.
//! - `application` depends on `domain`, `isokey-core`, and the traits it
//!   declares; it never names a socket or a MIDI driver.
//! - `infrastructure` implements those traits with axum, tower-http and
//!   midir.

/// Domain layer: configuration and session state (no I/O).
pub mod domain;

/// Application layer: device acquisition and the per-connection state machine.
pub mod application;

/// Infrastructure layer: WebSocket server, transports and MIDI backends.
pub mod infrastructure;
