//! [`FrameTransport`] over an upgraded axum WebSocket.

use std::fmt::Display;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tracing::{debug, warn};

use crate::application::transport::{FrameTransport, TransportError};

/// A server-side WebSocket connection to one browser.
///
/// Holds the two halves of the socket separately so tests can drive it with
/// an in-memory stream and sink.
pub struct WebSocketTransport<R, W> {
    frames: R,
    sink: W,
}

impl WebSocketTransport<SplitStream<WebSocket>, SplitSink<WebSocket, Message>> {
    /// Wraps an upgraded socket.
    pub fn from_socket(socket: WebSocket) -> Self {
        let (sink, frames) = socket.split();
        Self::new(frames, sink)
    }
}

impl<R, W> WebSocketTransport<R, W> {
    pub fn new(frames: R, sink: W) -> Self {
        Self { frames, sink }
    }
}

#[async_trait]
impl<R, W> FrameTransport for WebSocketTransport<R, W>
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
    W: Sink<Message> + Unpin + Send,
    W::Error: Display,
{
    async fn receive_frame(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let Some(next) = self.frames.next().await else {
                return Ok(None);
            };
            match next {
                Ok(Message::Text(text)) => return Ok(Some(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => warn!("ignoring non-UTF-8 binary frame"),
                },
                Ok(Message::Close(frame)) => {
                    debug!("peer sent close frame: {frame:?}");
                    return Ok(None);
                }
                // Pings are answered by the WebSocket layer itself.
                Ok(Message::Ping(_) | Message::Pong(_)) => {}
                Err(e) => return Err(TransportError::Receive(e.to_string())),
            }
        }
    }

    async fn send_frame(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.sink.close().await {
            debug!("WebSocket close handshake failed: {e}");
        }
    }
}
