// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for an OpenAI-compatible chat completions endpoint.
//!
//! One request per call. Failures are classified as transient or not; the
//! agent runtime owns deadlines and retries.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;
use volera_core::VoleraError;

use crate::types::{ApiErrorResponse, ChatCompletionRequest, ChatCompletionResponse};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenRouterClient {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self, VoleraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| VoleraError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert("x-title", HeaderValue::from_static("Volera"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| VoleraError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                transient: false,
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends one non-streaming completion request.
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, VoleraError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| VoleraError::Provider {
                message: format!("HTTP request failed: {e}"),
                transient: true,
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, model = request.model.as_str(), "completion response received");

        let body = response.text().await.map_err(|e| VoleraError::Provider {
            message: format!("failed to read response body: {e}"),
            transient: true,
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!("API error ({status}): {}", api_err.error.message),
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(VoleraError::Provider {
                message,
                transient: is_transient_status(status),
                source: None,
            });
        }

        serde_json::from_str(&body).map_err(|e| VoleraError::Provider {
            message: format!("failed to parse API response: {e}"),
            transient: false,
            source: Some(Box::new(e)),
        })
    }
}

/// Statuses worth retrying: rate limits, timeouts, and upstream outages.
fn is_transient_status(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504 | 529)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ApiMessage;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "openai/gpt-4o-mini".into(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: Some("Hello".into()),
                tool_calls: None,
                tool_call_id: None,
            }],
            response_format: None,
            max_tokens: None,
        }
    }

    fn success_body() -> serde_json::Value {
        serde_json::json!({
            "id": "gen-123",
            "model": "openai/gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": "Hi there!"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        })
    }

    #[tokio::test]
    async fn complete_success_sends_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "openai/gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .mount(&server)
            .await;

        let client = OpenRouterClient::new("sk-test", &server.uri()).unwrap();
        let resp = client.complete(&test_request()).await.unwrap();
        assert_eq!(resp.id, "gen-123");
        assert_eq!(resp.choices[0].message.content.as_deref(), Some("Hi there!"));
    }

    #[tokio::test]
    async fn rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "Rate limited", "code": 429}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenRouterClient::new("sk-test", &server.uri()).unwrap();
        let err = client.complete(&test_request()).await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("Rate limited"), "got: {err}");
    }

    #[tokio::test]
    async fn bad_request_is_not_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("no such model"))
            .mount(&server)
            .await;

        let client = OpenRouterClient::new("sk-test", &format!("{}/", server.uri())).unwrap();
        let err = client.complete(&test_request()).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("no such model"), "got: {err}");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transient() {
        let client = OpenRouterClient::new("sk-test", "http://127.0.0.1:9").unwrap();
        let err = client.complete(&test_request()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn transient_statuses() {
        for code in [408, 429, 500, 502, 503, 504, 529] {
            assert!(is_transient_status(reqwest::StatusCode::from_u16(code).unwrap()));
        }
        for code in [400, 401, 403, 404, 422] {
            assert!(!is_transient_status(reqwest::StatusCode::from_u16(code).unwrap()));
        }
    }
}
