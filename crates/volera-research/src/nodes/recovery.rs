// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use volera_core::VoleraError;
use volera_graph::{Command, Node, RunConfig};

use super::user_facing;
use crate::context::ResearchContext;
use crate::state::{ConversationState, FailureKind, StateUpdate, PLANNER};

/// Fed back to the planner when a plan found nothing.
pub const RETRY_PROMPT: &str = "An error occurred, can you try a new plan";

/// Error node of the research graph.
///
/// An empty plan goes back to the planner. Budget and fatal failures are
/// reported to the client and end the run.
pub struct RecoveryNode {
    ctx: Arc<ResearchContext>,
}

impl RecoveryNode {
    pub fn new(ctx: Arc<ResearchContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Node<ConversationState> for RecoveryNode {
    async fn run(
        &self,
        state: &ConversationState,
        _config: &RunConfig,
    ) -> Result<Command<StateUpdate>, VoleraError> {
        let progress = self.ctx.progress(&state.ws_id);
        let Some(failure) = state.last_error.clone() else {
            error!(ws_id = state.ws_id.as_str(), "recovery reached without a recorded failure");
            let (notice, key) = user_facing(&VoleraError::Internal(String::new()));
            progress.error(notice.clone(), key).await;
            return Ok(Command::end(StateUpdate {
                reply: Some(notice),
                ..StateUpdate::default()
            }));
        };

        if failure.kind == FailureKind::NoResults {
            info!(ws_id = state.ws_id.as_str(), node = failure.node.as_str(), "plan found nothing, replanning");
            progress.comment("No products found, trying a new plan").await;
            return Ok(Command::goto(
                PLANNER,
                StateUpdate {
                    human_response: Some(RETRY_PROMPT.to_string()),
                    clear_failure: true,
                    ..StateUpdate::default()
                },
            ));
        }

        error!(
            ws_id = state.ws_id.as_str(),
            node = failure.node.as_str(),
            kind = ?failure.kind,
            message = failure.message.as_str(),
            "research run failed"
        );
        progress.error(failure.notice.clone(), failure.key.clone()).await;
        Ok(Command::end(StateUpdate {
            reply: Some(failure.notice),
            clear_failure: true,
            ..StateUpdate::default()
        }))
    }
}
