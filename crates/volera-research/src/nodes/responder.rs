// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};
use volera_core::types::Charge;
use volera_core::VoleraError;
use volera_credits::TrackOutcome;
use volera_graph::{Command, Node, RunConfig};

use super::{credits_message, research_charge_key, INSUFFICIENT_CREDITS_KEY};
use crate::context::ResearchContext;
use crate::prompts;
use crate::schema::ResponderOutput;
use crate::state::{AgentResult, ConversationState, StateUpdate};

/// How long the responder waits for the background image search.
const IMAGE_WAIT: Duration = Duration::from_secs(10);

/// Writes the final answer and sends the reviewed products to the client.
///
/// The research run is charged here, once, keyed by the run id.
pub struct ResponderNode {
    ctx: Arc<ResearchContext>,
}

impl ResponderNode {
    pub fn new(ctx: Arc<ResearchContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Node<ConversationState> for ResponderNode {
    async fn run(
        &self,
        state: &ConversationState,
        _config: &RunConfig,
    ) -> Result<Command<StateUpdate>, VoleraError> {
        let progress = self.ctx.progress(&state.ws_id);
        let wanted = state
            .agent_results
            .planner
            .as_ref()
            .map(|p| p.no_of_results as usize)
            .unwrap_or(0);
        let mut products = state.reviewed_products();
        if wanted > 0 {
            products.truncate(wanted);
        }

        let response = self
            .ctx
            .runtime
            .call_llm(
                &state.user_id,
                &prompts::responder(&state.ws_message.content, &products),
                Charge::Text,
                &state.model,
                None,
                &state.message_history,
            )
            .await?;

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
                    ..StateUpdate::default()
                }));
            }
            Err(e) => return Err(e),
        }

        let message_id = uuid::Uuid::new_v4().to_string();
        let content = response.text.clone();
        progress.sources(state.sources.clone()).await;
        progress.message(content.clone()).await;
        progress.products(&message_id, &state.chat_id, products.clone()).await;

        let mut update = StateUpdate::default();
        if let Some(task_id) = &state.task_id {
            let images = self.ctx.images.take(task_id, IMAGE_WAIT).await;
            progress.images(images).await;
            update.clear_task = true;
        }
        progress.message_end(content.clone()).await;
        progress.search_complete(state.total_searched, state.total_scraped).await;

        info!(
            ws_id = state.ws_id.as_str(),
            products = products.len(),
            "research answer sent"
        );
        update.agent_result = Some(AgentResult::Responder(ResponderOutput {
            message_id,
            content: content.clone(),
            product_ids: products.into_iter().map(|p| p.product_id).collect(),
        }));
        update.new_messages = response.new_messages;
        update.reply = Some(content);
        Ok(Command::end(update))
    }
}
