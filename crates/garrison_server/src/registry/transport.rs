//! Transport abstraction between the registry and the wire.
//!
//! The registry never touches sockets directly; it delivers through a
//! [`NodeTransport`], so message fan-out is testable without networking
//! and the WebSocket layer stays confined to one adapter.

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};

/// Outbound half of a node's connection.
///
/// Delivery failure means the peer is gone; the registry treats it as an
/// implicit disconnect and never surfaces it to broadcast callers.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Delivers one message to the peer.
    async fn deliver(&self, message: &[u8]) -> Result<(), String>;

    /// Closes the connection, best effort.
    async fn close(&self, reason: &str);
}

/// WebSocket-backed transport used by the production accept loop.
pub struct WsTransport {
    sender: Arc<tokio::sync::Mutex<SplitSink<WebSocketStream<TcpStream>, Message>>>,
}

impl WsTransport {
    pub fn new(
        sender: Arc<tokio::sync::Mutex<SplitSink<WebSocketStream<TcpStream>, Message>>>,
    ) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl NodeTransport for WsTransport {
    async fn deliver(&self, message: &[u8]) -> Result<(), String> {
        let text = String::from_utf8_lossy(message).to_string();
        let mut sender = self.sender.lock().await;
        sender
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| format!("WebSocket send failed: {e}"))
    }

    async fn close(&self, reason: &str) {
        use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
        use tokio_tungstenite::tungstenite::protocol::CloseFrame;

        let mut sender = self.sender.lock().await;
        let _ = sender
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: reason.to_string().into(),
            })))
            .await;
    }
}
