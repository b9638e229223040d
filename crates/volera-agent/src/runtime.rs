// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit-gated, deadline-bounded, retried model calls.

use std::sync::Arc;

use tracing::{debug, info, warn};
use volera_core::types::{LlmRequest, LlmResponse, ModelMessage, ResponseFormat};
use volera_core::{Charge, LlmProvider, VoleraError};
use volera_credits::{CreditLedger, TrackOutcome};

use crate::retry::RetryPolicy;

/// System and user text for one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            user: user.into(),
        }
    }

    pub fn user(user: impl Into<String>) -> Self {
        Self {
            system: None,
            user: user.into(),
        }
    }
}

/// Wraps an [`LlmProvider`] with credit gating, timeouts, retries, and
/// accounting. Shared by every agent node.
#[derive(Clone)]
pub struct AgentRuntime {
    provider: Arc<dyn LlmProvider>,
    ledger: Arc<CreditLedger>,
    policy: RetryPolicy,
}

impl AgentRuntime {
    pub fn new(provider: Arc<dyn LlmProvider>, ledger: Arc<CreditLedger>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            ledger,
            policy,
        }
    }

    pub fn ledger(&self) -> &Arc<CreditLedger> {
        &self.ledger
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs one model call on behalf of `user_id`.
    ///
    /// Fails with `InsufficientCredits` or `DailyLimitExceeded` before calling
    /// the provider when the user cannot pay for `charge`. Each attempt is
    /// bounded by the policy's deadline; transient failures (including
    /// timeouts) are retried with backoff. On success the cost is deducted
    /// under the response id, so a replayed deduction is a no-op.
    ///
    /// The returned `new_messages` hold the user turn and the model's reply;
    /// callers append them to their history.
    #[allow(clippy::too_many_arguments)]
    pub async fn call_llm(
        &self,
        user_id: &str,
        prompt: &Prompt,
        charge: Charge,
        model: &str,
        deps: Option<serde_json::Value>,
        history: &[ModelMessage],
    ) -> Result<LlmResponse, VoleraError> {
        self.call_with_format(user_id, prompt, charge, model, deps, history, None)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn call_with_format(
        &self,
        user_id: &str,
        prompt: &Prompt,
        charge: Charge,
        model: &str,
        deps: Option<serde_json::Value>,
        history: &[ModelMessage],
        response_format: Option<ResponseFormat>,
    ) -> Result<LlmResponse, VoleraError> {
        self.ledger.check(user_id, charge).await?.into_result()?;
        self.ledger.check_daily_limit(user_id, charge).await?;

        let request = LlmRequest {
            model: model.to_string(),
            system: prompt.system.clone(),
            prompt: prompt.user.clone(),
            history: history.to_vec(),
            response_format,
            deps,
            max_tokens: None,
        };

        let mut response = self.run_with_retry(user_id, request).await?;
        if response.id.is_empty() {
            response.id = format!("local-{}", uuid::Uuid::new_v4());
        }
        if response.new_messages.is_empty() {
            response.new_messages = vec![
                ModelMessage::user(prompt.user.clone()),
                ModelMessage::assistant(response.text.clone()),
            ];
        }

        match self
            .ledger
            .track(user_id, charge, Some(response.usage), &response.id)
            .await
        {
            Ok(TrackOutcome::Charged { cost, balance }) => {
                info!(
                    user_id,
                    model,
                    response_id = response.id.as_str(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    cost,
                    balance,
                    "llm call completed"
                );
            }
            Ok(TrackOutcome::Duplicate { balance }) => {
                debug!(user_id, response_id = response.id.as_str(), balance, "llm call already charged");
            }
            Err(e @ VoleraError::InsufficientCredits { .. }) => {
                // Admitted by the pre-flight check; a concurrent call drained the balance.
                warn!(user_id, response_id = response.id.as_str(), error = %e, "deduction refused after call");
            }
            Err(e) => return Err(e),
        }

        Ok(response)
    }

    async fn run_with_retry(&self, user_id: &str, request: LlmRequest) -> Result<LlmResponse, VoleraError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            debug!(user_id, model = request.model.as_str(), attempt, "calling model");

            let result = match tokio::time::timeout(
                self.policy.call_timeout,
                self.provider.run(request.clone()),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(VoleraError::Timeout {
                    duration: self.policy.call_timeout,
                }),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt <= self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        user_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient model failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(user_id, attempt, error = %e, "model call failed");
                    return Err(e);
                }
            }
        }
    }
}
