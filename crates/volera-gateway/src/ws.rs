// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler.
//!
//! Client -> Server (JSON), any of:
//! ```json
//! {"type": "message", "content": "lightweight laptop under $800"}
//! {"type": "AGENT_REQUEST", "data": {"content": "...", "focus_mode": "shopping"}}
//! ```
//!
//! Server -> Client: the `type`-tagged events of [`OutboundEvent`].

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};
use volera_core::events::InboundEvent;
use volera_core::{EventSink, OutboundEvent};

use crate::conversation::Connection;
use crate::server::GatewayState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Owner of the credit account charged for this socket. Required.
    #[serde(default, alias = "userId")]
    pub user_id: Option<String>,
    /// Resume an earlier conversation; a new one is started when absent.
    #[serde(default, alias = "chatId")]
    pub chat_id: Option<String>,
}

impl WsParams {
    /// `None` without a user id: credits are per user, so a socket without
    /// one has no account to charge.
    fn connection(&self, ws_id: String) -> Option<Connection> {
        let user_id = self.user_id.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        Some(Connection {
            user_id: user_id.to_string(),
            chat_id: self
                .chat_id
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            ws_id,
        })
    }
}

/// GET /ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<GatewayState>,
) -> Response {
    let Some(conn) = params.connection(uuid::Uuid::new_v4().to_string()) else {
        warn!("websocket upgrade without user_id rejected");
        return (StatusCode::BAD_REQUEST, "user_id is required").into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, conn, state))
}

async fn handle_socket(socket: WebSocket, conn: Connection, state: GatewayState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut rx = state.registry.register(&conn.ws_id);
    info!(ws_id = conn.ws_id.as_str(), chat_id = conn.chat_id.as_str(), "client connected");

    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // Turns run inline: one conversation never runs two nodes at once.
    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let event = match InboundEvent::parse(text.as_str()) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(ws_id = conn.ws_id.as_str(), error = %e, "invalid frame");
                        report(&state, &conn.ws_id, format!("Invalid message: {e}"), "invalid_message").await;
                        continue;
                    }
                };
                if let Err(e) = state.conversations.handle(&conn, event).await {
                    warn!(ws_id = conn.ws_id.as_str(), error = %e, "turn failed");
                    report(
                        &state,
                        &conn.ws_id,
                        "Something went wrong while handling your message. Please try again.".to_string(),
                        "internal",
                    )
                    .await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.registry.unregister(&conn.ws_id);
    state.conversations.close(&conn.chat_id).await;
    sender_task.abort();
    info!(ws_id = conn.ws_id.as_str(), "client disconnected");
}

async fn report(state: &GatewayState, ws_id: &str, data: String, key: &str) {
    let event = OutboundEvent::Error {
        data,
        key: key.to_string(),
    };
    if let Err(e) = state.registry.send(ws_id, event).await {
        warn!(ws_id, error = %e, "could not report error to client");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_accept_camel_case_and_fill_defaults() {
        let params: WsParams = serde_json::from_value(serde_json::json!({"userId": "u1"})).unwrap();
        let conn = params.connection("ws-1".into()).unwrap();
        assert_eq!(conn.user_id, "u1");
        assert_eq!(conn.ws_id, "ws-1");
        assert!(!conn.chat_id.is_empty());

        let params: WsParams =
            serde_json::from_value(serde_json::json!({"user_id": " u2 ", "chat_id": "c9"})).unwrap();
        let conn = params.connection("ws-2".into()).unwrap();
        assert_eq!(conn.user_id, "u2");
        assert_eq!(conn.chat_id, "c9");
    }

    #[test]
    fn sockets_without_a_user_get_no_connection() {
        let params: WsParams = serde_json::from_value(serde_json::json!({"chat_id": "c9"})).unwrap();
        assert!(params.connection("ws-1".into()).is_none());

        let params: WsParams = serde_json::from_value(serde_json::json!({"userId": "  "})).unwrap();
        assert!(params.connection("ws-2".into()).is_none());
    }
}
