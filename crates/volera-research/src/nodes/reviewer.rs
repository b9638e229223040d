// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use volera_core::types::Charge;
use volera_core::VoleraError;
use volera_graph::{Command, Node, RunConfig};

use crate::context::ResearchContext;
use crate::prompts;
use crate::schema::{ReviewOutput, ReviewStatus};
use crate::state::{AgentResult, ConversationState, StateUpdate, RESEARCHER, RESPONDER};

/// Checks this round's products against the plan's filter criteria.
///
/// Accepted ids accumulate across rounds; the responder runs once
/// `review_target` products have been accepted.
pub struct ReviewerNode {
    ctx: Arc<ResearchContext>,
}

impl ReviewerNode {
    pub fn new(ctx: Arc<ResearchContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Node<ConversationState> for ReviewerNode {
    async fn run(
        &self,
        state: &ConversationState,
        _config: &RunConfig,
    ) -> Result<Command<StateUpdate>, VoleraError> {
        if state.current_products.is_empty() {
            return Ok(Command::goto(RESEARCHER, StateUpdate::default()));
        }
        let plan = state.agent_results.planner.clone().unwrap_or_default();

        let out = self
            .ctx
            .runtime
            .call_structured::<ReviewOutput>(
                &state.user_id,
                "review",
                &prompts::reviewer(&plan, &state.current_products),
                Charge::Text,
                &state.model,
                None,
                &[],
            )
            .await?;
        let mut review = out.value.unwrap_or_else(|| {
            warn!(ws_id = state.ws_id.as_str(), "reviewer answered outside its schema, failing the round");
            ReviewOutput::default()
        });

        let offered: HashSet<&str> = state
            .current_products
            .iter()
            .map(|p| p.product_id.as_str())
            .collect();
        review.product_ids.retain(|id| offered.contains(id.as_str()));
        if review.status == ReviewStatus::Passed && review.product_ids.is_empty() {
            review.status = ReviewStatus::Failed;
        }

        let mut update = StateUpdate::default();
        let goto = match review.status {
            ReviewStatus::Passed => {
                let mut accepted: HashSet<&str> =
                    state.reviewed_products_ids.iter().map(String::as_str).collect();
                accepted.extend(review.product_ids.iter().map(String::as_str));
                let total = accepted.len();
                update.reviewed_ids = review.product_ids.clone();
                info!(
                    ws_id = state.ws_id.as_str(),
                    accepted = review.product_ids.len(),
                    total,
                    target = self.ctx.config.review_target,
                    "review passed"
                );
                if total >= self.ctx.config.review_target {
                    RESPONDER
                } else {
                    RESEARCHER
                }
            }
            ReviewStatus::Failed => {
                info!(ws_id = state.ws_id.as_str(), comment = review.comment.as_str(), "review failed");
                RESEARCHER
            }
        };
        update.agent_result = Some(AgentResult::Reviewer(review));
        Ok(Command::goto(goto, update))
    }
}
