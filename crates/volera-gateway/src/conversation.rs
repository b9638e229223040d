// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One user turn: buffer the message, run the graph, buffer the reply.

use std::sync::Arc;

use tracing::{info, warn};
use volera_core::events::InboundEvent;
use volera_core::types::{MessageRole, WsMessage};
use volera_core::VoleraError;
use volera_graph::GraphOutcome;
use volera_research::{run_turn, ConversationState, ResearchGraph, SessionInfo};
use volera_storage::SessionBuffer;

/// Who is talking on a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub user_id: String,
    pub ws_id: String,
    pub chat_id: String,
}

/// Runs conversations on the research graph and records them in the
/// session buffer.
#[derive(Clone)]
pub struct ConversationService {
    graph: Arc<ResearchGraph>,
    buffer: SessionBuffer,
    default_model: String,
    max_depth: u32,
}

impl ConversationService {
    pub fn new(graph: Arc<ResearchGraph>, buffer: SessionBuffer, default_model: impl Into<String>, max_depth: u32) -> Self {
        Self {
            graph,
            buffer,
            default_model: default_model.into(),
            max_depth,
        }
    }

    pub fn buffer(&self) -> &SessionBuffer {
        &self.buffer
    }

    pub async fn handle(
        &self,
        conn: &Connection,
        event: InboundEvent,
    ) -> Result<GraphOutcome<ConversationState>, VoleraError> {
        self.buffer
            .open(&conn.chat_id, &conn.user_id, event.focus_mode.as_deref(), &event.files)
            .await?;
        self.buffer
            .append(
                &conn.chat_id,
                MessageRole::Human,
                &event.content,
                serde_json::json!({ "ws_id": conn.ws_id }),
            )
            .await?;

        let session = SessionInfo {
            user_id: conn.user_id.clone(),
            ws_id: conn.ws_id.clone(),
            chat_id: conn.chat_id.clone(),
            model: self.default_model.clone(),
            max_depth: self.max_depth,
        };
        let message = WsMessage {
            content: event.content,
            focus_mode: event.focus_mode,
            optimization_mode: event.optimization_mode,
            files: event.files,
        };
        let outcome = run_turn(&self.graph, &conn.chat_id, session, message).await?;

        if let Some(reply) = &outcome.state.reply {
            let metadata = match &outcome.state.agent_results.responder {
                Some(answer) => serde_json::json!({
                    "message_id": answer.message_id,
                    "product_ids": answer.product_ids,
                }),
                None => serde_json::json!({}),
            };
            self.buffer
                .append(&conn.chat_id, MessageRole::Assistant, reply, metadata)
                .await?;
        }
        info!(
            chat_id = conn.chat_id.as_str(),
            sink = %outcome.sink,
            invocations = outcome.invocations,
            "turn finished"
        );
        Ok(outcome)
    }

    /// Marks the conversation's session closed so sync picks it up.
    pub async fn close(&self, chat_id: &str) {
        if let Err(e) = self.buffer.close(chat_id).await {
            warn!(chat_id, error = %e, "failed to close session");
        }
    }
}
