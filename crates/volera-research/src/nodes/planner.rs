// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use volera_agent::ProgressChannel;
use volera_core::types::{Charge, ModelMessage};
use volera_core::VoleraError;
use volera_credits::TrackOutcome;
use volera_graph::{Command, INPUT, Node, RunConfig};

use super::{credits_message, research_charge_key, INSUFFICIENT_CREDITS_KEY};
use crate::context::ResearchContext;
use crate::prompts;
use crate::schema::{PlannerAction, PlannerOutput};
use crate::state::{sort_by_relevance, AgentResult, ConversationState, StateUpdate, PLANNER, RESEARCHER};

const DEFAULT_QUESTION: &str = "Could you tell me a bit more about what you are looking for?";

/// Turns the user's request into a clarifying question or a search plan.
///
/// The planner is the entry node and the target of every back-edge, so it
/// also owns the depth guard: once the loop has re-entered it `max_depth`
/// times, it shows the best products found so far and yields to the user.
pub struct PlannerNode {
    ctx: Arc<ResearchContext>,
}

impl PlannerNode {
    pub fn new(ctx: Arc<ResearchContext>) -> Self {
        Self { ctx }
    }

    async fn present_best(
        &self,
        state: &ConversationState,
        progress: &ProgressChannel,
    ) -> Result<Command<StateUpdate>, VoleraError> {
        let mut products = state.reviewed_products();
        if products.is_empty() {
            products = state.current_products.clone();
            sort_by_relevance(&mut products);
        }
        let wanted = state
            .agent_results
            .planner
            .as_ref()
            .map(|p| p.no_of_results as usize)
            .unwrap_or(0);
        if wanted > 0 {
            products.truncate(wanted);
        }
        info!(
            ws_id = state.ws_id.as_str(),
            depth = state.current_depth,
            products = products.len(),
            "research depth exhausted, presenting best results"
        );

        let charged = !products.is_empty();
        let reply = if products.is_empty() {
            "I could not find products matching your request. \
             Could you rephrase it or relax some of the criteria?"
                .to_string()
        } else {
            match self
                .ctx
                .runtime
                .ledger()
                .track(&state.user_id, Charge::Research, None, &research_charge_key(&state.run_id))
                .await
            {
                Ok(TrackOutcome::Charged { cost, balance }) => {
                    debug!(user_id = state.user_id.as_str(), cost, balance, "research charged");
                }
                Ok(TrackOutcome::Duplicate { .. }) => {}
                Err(VoleraError::InsufficientCredits { required, available }) => {
                    let message = credits_message(required, available);
                    progress.error(message.clone(), INSUFFICIENT_CREDITS_KEY).await;
                    return Ok(Command::end(StateUpdate {
                        reply: Some(message),
                        consume_human_response: true,
                        ..StateUpdate::default()
                    }));
                }
                Err(e) => return Err(e),
            }
            let message_id = uuid::Uuid::new_v4().to_string();
            progress.products(&message_id, &state.chat_id, products.clone()).await;
            format!(
                "Here are the {} best matches I found so far. \
                 Tell me how to refine the search if you want more.",
                products.len()
            )
        };

        progress.message(reply.clone()).await;
        progress.message_end(reply.clone()).await;
        progress.search_complete(state.total_searched, state.total_scraped).await;
        Ok(Command::human(StateUpdate {
            next_node: Some(PLANNER.to_string()),
            consume_human_response: true,
            close_run: charged,
            new_messages: vec![ModelMessage::assistant(reply.clone())],
            reply: Some(reply),
            ..StateUpdate::default()
        }))
    }
}

#[async_trait]
impl Node<ConversationState> for PlannerNode {
    async fn run(
        &self,
        state: &ConversationState,
        _config: &RunConfig,
    ) -> Result<Command<StateUpdate>, VoleraError> {
        let progress = self.ctx.progress(&state.ws_id);

        let check = self
            .ctx
            .runtime
            .ledger()
            .check(&state.user_id, Charge::Research)
            .await?;
        if !check.ok {
            warn!(
                user_id = state.user_id.as_str(),
                balance = check.balance,
                required = check.required,
                "not enough credits to research"
            );
            let message = credits_message(check.required, check.balance);
            progress.error(message.clone(), INSUFFICIENT_CREDITS_KEY).await;
            return Ok(Command::end(StateUpdate {
                reply: Some(message),
                consume_human_response: true,
                ..StateUpdate::default()
            }));
        }

        let reentry = state
            .previous_node
            .as_deref()
            .is_some_and(|prev| prev != INPUT);
        let depth = if reentry {
            if state.current_depth >= state.max_depth {
                return self.present_best(state, &progress).await;
            }
            state.current_depth + 1
        } else {
            state.current_depth
        };

        let deps = serde_json::json!({
            "user_id": state.user_id,
            "focus_mode": state.ws_message.focus_mode,
            "optimization_mode": state.ws_message.optimization_mode,
        });
        let out = self
            .ctx
            .runtime
            .call_structured::<PlannerOutput>(
                &state.user_id,
                "plan",
                &prompts::planner(state),
                Charge::Text,
                &state.model,
                Some(deps),
                &state.message_history,
            )
            .await?;
        let plan = out.value.unwrap_or_else(|| {
            warn!(ws_id = state.ws_id.as_str(), "planner answered outside its schema, using an empty plan");
            PlannerOutput::default()
        });

        let mut update = StateUpdate {
            current_depth: Some(depth),
            consume_human_response: true,
            new_messages: out.response.new_messages,
            ..StateUpdate::default()
        };

        match plan.action {
            PlannerAction::AskUser => {
                let question = if plan.content.trim().is_empty() {
                    DEFAULT_QUESTION.to_string()
                } else {
                    plan.content.trim().to_string()
                };
                info!(ws_id = state.ws_id.as_str(), "planner asked the user to clarify");
                progress.message(question.clone()).await;
                progress.message_end(question.clone()).await;
                update.next_node = Some(PLANNER.to_string());
                update.reply = Some(question);
                update.agent_result = Some(AgentResult::Planner(plan));
                Ok(Command::human(update))
            }
            PlannerAction::Research => {
                info!(
                    ws_id = state.ws_id.as_str(),
                    depth,
                    queries = plan.search_queries.len(),
                    "plan ready"
                );
                update.agent_result = Some(AgentResult::Planner(plan));
                Ok(Command::goto(RESEARCHER, update))
            }
        }
    }
}
