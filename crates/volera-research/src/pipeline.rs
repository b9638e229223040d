// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring of the research graph.
//!
//! ```text
//!            ┌──────────── human ────────────┐
//!            ▼                               │
//!  ─────▶ planner ──▶ researcher ──▶ reviewer ──▶ responder ──▶ end
//!            ▲            ▲  │          │
//!            │            └──┼──────────┘
//!            └── recovery ◀──┘ (no results, node errors)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use volera_core::types::{CheckpointStatus, WsMessage};
use volera_core::{Checkpointer, VoleraError};
use volera_graph::{CompiledGraph, GraphOutcome, Sink, SinkHook, StateGraph};

use crate::context::ResearchContext;
use crate::images::ImageTasks;
use crate::nodes::{PlannerNode, RecoveryNode, ResearcherNode, ResponderNode, ReviewerNode};
use crate::state::{
    ConversationState, SessionInfo, StateUpdate, PLANNER, RECOVERY, RESEARCHER, RESPONDER, REVIEWER,
};

pub type ResearchGraph = CompiledGraph<ConversationState>;

/// Cancels an image search the run started but never collected.
struct ReleaseImageTask {
    images: Arc<ImageTasks>,
}

#[async_trait]
impl SinkHook<ConversationState> for ReleaseImageTask {
    async fn on_sink(&self, state: &mut ConversationState, sink: Sink) -> Result<(), VoleraError> {
        if let Some(task_id) = state.task_id.take()
            && self.images.abort(&task_id)
        {
            debug!(ws_id = state.ws_id.as_str(), task_id = task_id.as_str(), %sink, "image task cancelled");
        }
        Ok(())
    }
}

/// Builds the planner/researcher/reviewer/responder graph with its
/// recovery node.
pub fn build_research_graph(
    ctx: ResearchContext,
    checkpointer: Arc<dyn Checkpointer>,
    recursion_limit: u32,
) -> Result<ResearchGraph, VoleraError> {
    let ctx = Arc::new(ctx);
    StateGraph::new()
        .add_node(PLANNER, PlannerNode::new(ctx.clone()))
        .add_node(RESEARCHER, ResearcherNode::new(ctx.clone()))
        .add_node(REVIEWER, ReviewerNode::new(ctx.clone()))
        .add_node(RESPONDER, ResponderNode::new(ctx.clone()))
        .add_node(RECOVERY, RecoveryNode::new(ctx.clone()))
        .set_entry(PLANNER)
        .set_error_node(RECOVERY)
        .set_sink_hook(ReleaseImageTask {
            images: ctx.images.clone(),
        })
        .recursion_limit(recursion_limit)
        .compile(checkpointer)
}

/// Runs one user turn on the conversation `thread_id`.
///
/// When the conversation is waiting on the user, the message is the answer
/// and the run resumes where it stopped. Otherwise it is a new request.
pub async fn run_turn(
    graph: &ResearchGraph,
    thread_id: &str,
    session: SessionInfo,
    message: WsMessage,
) -> Result<GraphOutcome<ConversationState>, VoleraError> {
    let suspended = matches!(
        graph.snapshot(thread_id).await?,
        Some((_, CheckpointStatus::Suspended))
    );
    let input = if suspended {
        debug!(thread_id, "resuming suspended conversation with the user's reply");
        StateUpdate::human_reply(session, message.content)
    } else {
        StateUpdate::user_message(session, message)
    };
    graph.invoke(thread_id, input).await
}
