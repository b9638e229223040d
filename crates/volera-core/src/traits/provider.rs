// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM capability consumed by the agent runtime.

use async_trait::async_trait;

use crate::error::VoleraError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{LlmRequest, LlmResponse};

/// A black-box model: `run(prompt, history) -> (text, tool_calls, new_messages)`.
///
/// Implementations perform a single attempt. Timeouts, retries and credit
/// accounting are the agent runtime's job.
#[async_trait]
pub trait LlmProvider: PluginAdapter {
    async fn run(&self, request: LlmRequest) -> Result<LlmResponse, VoleraError>;
}
