// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema-validated model output.
//!
//! The schema is derived from the output type with `schemars`, sent to the
//! model as the response format, and checked with `jsonschema` on return.
//! A malformed answer is retried once; a second failure yields no value.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tracing::warn;
use volera_core::types::{LlmResponse, ModelMessage, ResponseFormat};
use volera_core::{Charge, VoleraError};

use crate::runtime::{AgentRuntime, Prompt};

/// Validation attempts per structured call.
const VALIDATION_ATTEMPTS: usize = 2;

/// A structured call's outcome.
///
/// `value` is `None` when the model kept answering outside the schema;
/// `response` is the last raw answer either way.
#[derive(Debug, Clone)]
pub struct Structured<T> {
    pub value: Option<T>,
    pub response: LlmResponse,
}

impl AgentRuntime {
    /// Like [`call_llm`](AgentRuntime::call_llm), but asks for JSON matching
    /// `T`'s schema and decodes it.
    ///
    /// Credit, timeout, and transport errors propagate. Schema violations do
    /// not: the call is retried once and then returns `value: None`.
    #[allow(clippy::too_many_arguments)]
    pub async fn call_structured<T>(
        &self,
        user_id: &str,
        name: &str,
        prompt: &Prompt,
        charge: Charge,
        model: &str,
        deps: Option<serde_json::Value>,
        history: &[ModelMessage],
    ) -> Result<Structured<T>, VoleraError>
    where
        T: JsonSchema + DeserializeOwned,
    {
        let schema = serde_json::to_value(schemars::schema_for!(T))
            .map_err(|e| VoleraError::Internal(format!("schema for {name}: {e}")))?;
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| VoleraError::Internal(format!("schema for {name} does not compile: {e}")))?;
        let format = ResponseFormat {
            name: name.to_string(),
            schema,
        };

        let mut last = None;
        for attempt in 1..=VALIDATION_ATTEMPTS {
            let response = self
                .call_with_format(
                    user_id,
                    prompt,
                    charge,
                    model,
                    deps.clone(),
                    history,
                    Some(format.clone()),
                )
                .await?;

            let decoded = parse_json_output(&response).and_then(|payload| {
                let errors: Vec<String> = validator.iter_errors(&payload).map(|e| e.to_string()).collect();
                if !errors.is_empty() {
                    return Err(VoleraError::Validation {
                        message: errors.join("; "),
                    });
                }
                serde_json::from_value::<T>(payload).map_err(|e| VoleraError::Validation {
                    message: e.to_string(),
                })
            });

            match decoded {
                Ok(value) => {
                    return Ok(Structured {
                        value: Some(value),
                        response,
                    });
                }
                Err(e) => {
                    warn!(user_id, output = name, attempt, error = %e, "model output failed validation");
                    last = Some(response);
                }
            }
        }

        warn!(user_id, output = name, "model output invalid after retry, continuing without it");
        match last {
            Some(response) => Ok(Structured { value: None, response }),
            None => Err(VoleraError::Internal(format!("no response recorded for {name}"))),
        }
    }
}

/// Extracts the JSON payload of a response.
///
/// Reads the text, tolerating a surrounding Markdown code fence. When the
/// text is empty the first tool call's arguments are used instead.
pub fn parse_json_output(response: &LlmResponse) -> Result<serde_json::Value, VoleraError> {
    let mut text = strip_code_fence(response.text.trim());
    if text.is_empty() {
        let Some(call) = response.tool_calls.first() else {
            return Err(VoleraError::Validation {
                message: "empty model output".to_string(),
            });
        };
        text = call.arguments.trim();
    }
    serde_json::from_str(text).map_err(|e| VoleraError::Validation {
        message: format!("output is not JSON: {e}"),
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
