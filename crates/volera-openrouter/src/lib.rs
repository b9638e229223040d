// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible chat completions provider for Volera.
//!
//! Implements [`LlmProvider`] against OpenRouter (or any endpoint speaking
//! the same protocol). Structured calls are sent as a `json_schema`
//! response format.

pub mod client;
pub mod types;

use async_trait::async_trait;
use tracing::{debug, info};
use volera_config::model::LlmConfig;
use volera_core::types::{
    AdapterType, HealthStatus, LlmRequest, LlmResponse, ModelMessage, ModelRole, TokenUsage,
    ToolCall,
};
use volera_core::{LlmProvider, PluginAdapter, VoleraError};

use crate::client::OpenRouterClient;
use crate::types::{
    ApiFunctionCall, ApiJsonSchema, ApiMessage, ApiResponseFormat, ApiToolCall,
    ChatCompletionRequest, ChatCompletionResponse,
};

/// Chat completions provider implementing [`LlmProvider`].
pub struct OpenRouterProvider {
    client: OpenRouterClient,
}

impl OpenRouterProvider {
    /// Creates a provider from the `[llm]` section. The API key comes from
    /// `llm.api_key`, which the config loader also fills from
    /// `OPENROUTER_API_KEY`.
    pub fn new(config: &LlmConfig) -> Result<Self, VoleraError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                VoleraError::Config(
                    "LLM API key not found. Set llm.api_key in config or OPENROUTER_API_KEY environment variable.".into(),
                )
            })?;
        let client = OpenRouterClient::new(&api_key, &config.base_url)?;
        info!(base_url = client.base_url(), "chat completions provider initialized");
        Ok(Self { client })
    }

    pub fn with_client(client: OpenRouterClient) -> Self {
        Self { client }
    }
}

/// Converts an [`LlmRequest`] to the wire request.
///
/// `deps` are appended to the system message as a JSON context block.
fn to_chat_request(request: &LlmRequest) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(request.history.len() + 2);

    let mut system = request.system.clone().unwrap_or_default();
    if let Some(deps) = &request.deps {
        if !system.is_empty() {
            system.push_str("\n\n");
        }
        system.push_str("Context:\n");
        system.push_str(&deps.to_string());
    }
    if !system.is_empty() {
        messages.push(text_message("system", system));
    }

    messages.extend(request.history.iter().map(to_api_message));
    messages.push(text_message("user", request.prompt.clone()));

    ChatCompletionRequest {
        model: request.model.clone(),
        messages,
        response_format: request.response_format.as_ref().map(|f| ApiResponseFormat {
            type_: "json_schema",
            json_schema: ApiJsonSchema {
                name: f.name.clone(),
                schema: f.schema.clone(),
                strict: false,
            },
        }),
        max_tokens: request.max_tokens,
    }
}

fn text_message(role: &str, content: String) -> ApiMessage {
    ApiMessage {
        role: role.to_string(),
        content: Some(content),
        tool_calls: None,
        tool_call_id: None,
    }
}

fn to_api_message(message: &ModelMessage) -> ApiMessage {
    let tool_calls = (!message.tool_calls.is_empty()).then(|| {
        message
            .tool_calls
            .iter()
            .map(|c| ApiToolCall {
                id: c.id.clone(),
                type_: "function".to_string(),
                function: ApiFunctionCall {
                    name: c.name.clone(),
                    arguments: c.arguments.clone(),
                },
            })
            .collect()
    });
    ApiMessage {
        role: message.role.to_string(),
        content: Some(message.content.clone()),
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

fn from_chat_response(request: &LlmRequest, response: ChatCompletionResponse) -> Result<LlmResponse, VoleraError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| VoleraError::provider("completion returned no choices"))?;

    let text = choice.message.content.unwrap_or_default();
    let tool_calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|c| ToolCall {
            id: c.id,
            name: c.function.name,
            arguments: c.function.arguments,
        })
        .collect();
    let usage = response.usage.unwrap_or_default();

    let reply = ModelMessage {
        role: ModelRole::Assistant,
        content: text.clone(),
        tool_calls: tool_calls.clone(),
        tool_call_id: None,
    };

    Ok(LlmResponse {
        id: response.id,
        model: if response.model.is_empty() {
            request.model.clone()
        } else {
            response.model
        },
        text,
        tool_calls,
        new_messages: vec![ModelMessage::user(request.prompt.clone()), reply],
        usage: TokenUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        },
    })
}

#[async_trait]
impl PluginAdapter for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, VoleraError> {
        // No probe call; a health check should not spend tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VoleraError> {
        debug!("chat completions provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    async fn run(&self, request: LlmRequest) -> Result<LlmResponse, VoleraError> {
        let wire = to_chat_request(&request);
        let response = self.client.complete(&wire).await?;
        from_chat_response(&request, response)
    }
}
