//! Connection handling logic for WebSocket clients.
//!
//! This module contains the core connection handling logic that manages
//! the lifecycle of individual client connections, including WebSocket
//! handshaking, login admission, chat routing, and cleanup.

use crate::{
    chat::{ChatModerationEngine, IdentityRecord, UserRole},
    error::ServerError,
    headless::BOT_HOST_COMMENT,
    login::ConnectionAttempt,
    registry::{transport::WsTransport, NodeRegistry, NodeTransport},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::net::TcpStream;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// First frame a client must send after the WebSocket handshake.
#[derive(Debug, Deserialize)]
struct LoginFrame {
    name: String,
    #[serde(default)]
    credentials: String,
    #[serde(default)]
    mac: String,
    #[serde(default)]
    role: Option<String>,
}

/// Any frame after login; `action` selects the handler.
#[derive(Debug, Deserialize)]
struct ClientFrame {
    action: String,
    #[serde(default)]
    text: String,
}

fn role_from_label(label: Option<&str>) -> UserRole {
    match label {
        Some("admin") => UserRole::Admin,
        Some("moderator") => UserRole::Moderator,
        Some("anonymous") => UserRole::Anonymous,
        _ => UserRole::Player,
    }
}

/// Greeting frame advertising the host to a newly admitted node.
///
/// Carries the host's display name, the automated-host comment, and the
/// (possibly disambiguated) name the node was admitted under.
fn welcome_envelope(host_name: &str, assigned_name: &str) -> serde_json::Value {
    serde_json::json!({
        "event": "welcome",
        "host": host_name,
        "comment": BOT_HOST_COMMENT,
        "name": assigned_name,
    })
}

/// Handles a single client connection from establishment to cleanup.
///
/// # Connection Flow
///
/// 1. Perform WebSocket handshake
/// 2. Read the login frame and submit it to the registry for admission
/// 3. Attach the session to the chat moderation engine
/// 4. Route chat frames until the connection ends
/// 5. Detach the session and remove the node
///
/// # Arguments
///
/// * `stream` - The TCP stream for the client connection
/// * `addr` - The remote address of the client
/// * `host_name` - Display name the host advertises in its greeting
/// * `registry` - Node registry performing admission and fan-out
/// * `chat` - Moderation engine evaluating every chat frame
///
/// # Returns
///
/// `Ok(())` if the connection was handled to completion (including a
/// rejected login), or a `ServerError` on handshake failure.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    host_name: String,
    registry: Arc<NodeRegistry>,
    chat: Arc<ChatModerationEngine>,
) -> Result<(), ServerError> {
    // Perform WebSocket handshake
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;

    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let ws_sender = Arc::new(tokio::sync::Mutex::new(ws_sender));
    let transport = Arc::new(WsTransport::new(ws_sender.clone()));

    // The first frame must be a login; anything else drops the connection.
    let login = loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                match serde_json::from_str::<LoginFrame>(&text) {
                    Ok(frame) => break frame,
                    Err(e) => {
                        warn!(%addr, error = %e, "🚫 Unparseable login frame");
                        transport.close("malformed login").await;
                        return Ok(());
                    }
                }
            }
            Some(Ok(Message::Ping(data))) => {
                let mut sender = ws_sender.lock().await;
                let _ = sender.send(Message::Pong(data)).await;
            }
            Some(Ok(Message::Close(_))) | None => {
                debug!(%addr, "Connection closed before login");
                return Ok(());
            }
            Some(Ok(_)) => {
                warn!(%addr, "🚫 Non-text frame before login");
                transport.close("expected a login frame").await;
                return Ok(());
            }
            Some(Err(e)) => {
                return Err(ServerError::Network(format!("WebSocket error: {e}")));
            }
        }
    };

    let role = role_from_label(login.role.as_deref());
    let attempt = ConnectionAttempt {
        name: login.name,
        credentials: login.credentials,
        ip: addr.ip().to_string(),
        hashed_mac: login.mac,
    };

    let node = match registry.admit(transport.clone(), addr, attempt).await {
        Ok(node) => node,
        // Rejection is logged and the transport closed by the registry.
        Err(_) => return Ok(()),
    };

    let session = Uuid::new_v4();
    let participant = chat
        .attach(
            session,
            &IdentityRecord {
                username: node.name.clone(),
                role,
                chat_id: Uuid::new_v4(),
            },
        )
        .await;

    let welcome = welcome_envelope(&host_name, &node.name);
    registry.send(node.id, welcome.to_string().as_bytes()).await;

    // Message loop: route chat frames through moderation to the room.
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let frame: ClientFrame = match serde_json::from_str(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!(name = %node.name, error = %e, "Dropping unparseable frame");
                        continue;
                    }
                };
                if frame.action != "chat" {
                    debug!(name = %node.name, action = %frame.action, "Unknown action");
                    continue;
                }

                let now = SystemTime::now();
                if chat.is_muted(&participant, now).await {
                    if let Some(expiry) = chat.mute_expiry(&participant).await {
                        let remaining = crate::chat::format_remaining(now, expiry);
                        let notice = serde_json::json!({
                            "event": "muted",
                            "message": format!("You have been muted, expiring in: {remaining}"),
                        });
                        registry.send(node.id, notice.to_string().as_bytes()).await;
                    }
                    continue;
                }
                if chat.contains_disallowed(&frame.text).await {
                    info!(name = %node.name, "Chat message blocked by word filter");
                    continue;
                }

                let envelope = serde_json::json!({
                    "event": "chat",
                    "from": participant.username,
                    "text": frame.text,
                });
                registry.broadcast(envelope.to_string().as_bytes()).await;
            }
            Ok(Message::Close(_)) => {
                debug!(name = %node.name, "🔌 Client requested close");
                break;
            }
            Ok(Message::Ping(data)) => {
                let mut sender = ws_sender.lock().await;
                let _ = sender.send(Message::Pong(data)).await;
            }
            Err(e) => {
                error!(name = %node.name, "WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    chat.detach(session).await;
    registry.remove(node.id).await;
    info!(name = %node.name, "👋 Connection closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_labels_map_to_roles() {
        assert_eq!(role_from_label(Some("admin")), UserRole::Admin);
        assert_eq!(role_from_label(Some("moderator")), UserRole::Moderator);
        assert_eq!(role_from_label(Some("anonymous")), UserRole::Anonymous);
        assert_eq!(role_from_label(Some("player")), UserRole::Player);
        assert_eq!(role_from_label(None), UserRole::Player);
    }

    #[test]
    fn welcome_advertises_the_automated_host_comment() {
        let value = welcome_envelope("Bot_host", "Alice (2)");
        assert_eq!(value["event"], "welcome");
        assert_eq!(value["host"], "Bot_host");
        assert_eq!(value["comment"], "automated_host");
        assert_eq!(value["name"], "Alice (2)");
    }

    #[test]
    fn login_frame_tolerates_missing_optional_fields() {
        let frame: LoginFrame = serde_json::from_str(r#"{"name":"Alice"}"#).unwrap();
        assert_eq!(frame.name, "Alice");
        assert!(frame.credentials.is_empty());
        assert!(frame.mac.is_empty());
        assert!(frame.role.is_none());
    }
}
