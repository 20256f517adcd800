//! The text-frame transport a session talks through.
//!
//! The session logic only needs three things from the browser connection:
//! receive the next text frame, send a text frame, and close.  Keeping that
//! behind a trait lets the session be driven by a scripted transport in unit
//! tests and by a WebSocket in production.

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a [`FrameTransport`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Reading from the peer failed for a reason other than a clean close.
    #[error("transport receive failed: {0}")]
    Receive(String),

    /// Writing to the peer failed.
    #[error("transport send failed: {0}")]
    Send(String),
}

/// A bidirectional stream of text frames to one browser.
#[async_trait]
pub trait FrameTransport: Send {
    /// Waits for the next text frame.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection.  Control
    /// frames (ping, pong) are handled internally and never surface here.
    async fn receive_frame(&mut self) -> Result<Option<String>, TransportError>;

    /// Sends one text frame.
    async fn send_frame(&mut self, text: String) -> Result<(), TransportError>;

    /// Closes the connection.  Best effort; errors are ignored.
    async fn shutdown(&mut self) {}
}
