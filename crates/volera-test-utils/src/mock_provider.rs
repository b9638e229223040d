// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider for deterministic testing.
//!
//! `MockProvider` implements `LlmProvider` with scripted replies, enabling
//! fast, CI-runnable tests without external API calls. Replies can be routed
//! by the requested response format name, so concurrent structured calls
//! from different agents each get their own script.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use volera_core::types::{
    AdapterType, HealthStatus, LlmRequest, LlmResponse, ModelMessage, TokenUsage,
};
use volera_core::{LlmProvider, PluginAdapter, VoleraError};

/// One scripted outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    Text(String),
    /// A retryable provider error.
    Transient(String),
    /// A non-retryable provider error.
    Fatal(String),
    /// Never answers; only a deadline ends the call.
    Hang,
}

impl MockReply {
    pub fn json(value: serde_json::Value) -> Self {
        Self::Text(value.to_string())
    }
}

/// A mock LLM provider that returns pre-configured replies.
///
/// Lookup order for a request: the queue for its response format name, the
/// sticky reply for that name, the general FIFO queue, then `"mock response"`.
#[derive(Default)]
pub struct MockProvider {
    queue: Mutex<VecDeque<MockReply>>,
    by_format: Mutex<HashMap<String, VecDeque<MockReply>>>,
    sticky: Mutex<HashMap<String, MockReply>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<LlmRequest>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-loads the general queue with text replies.
    pub fn with_responses(responses: Vec<String>) -> Self {
        let provider = Self::new();
        for text in responses {
            provider.push(MockReply::Text(text));
        }
        provider
    }

    /// Sleeps this long before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Appends to the general queue.
    pub fn push(&self, reply: MockReply) {
        lock(&self.queue).push_back(reply);
    }

    /// Appends to the queue for requests whose response format is `format`.
    pub fn push_for(&self, format: &str, reply: MockReply) {
        lock(&self.by_format)
            .entry(format.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Reply used for `format` whenever its queue is empty.
    pub fn always_for(&self, format: &str, reply: MockReply) {
        lock(&self.sticky).insert(format.to_string(), reply);
    }

    /// Every request received, in arrival order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Most calls that were ever running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Requests that asked for the given response format.
    pub fn requests_for(&self, format: &str) -> Vec<LlmRequest> {
        lock(&self.requests)
            .iter()
            .filter(|r| r.response_format.as_ref().is_some_and(|f| f.name == format))
            .cloned()
            .collect()
    }

    fn next_reply(&self, request: &LlmRequest) -> MockReply {
        if let Some(format) = request.response_format.as_ref().map(|f| f.name.as_str()) {
            if let Some(reply) = lock(&self.by_format)
                .get_mut(format)
                .and_then(VecDeque::pop_front)
            {
                return reply;
            }
            if let Some(reply) = lock(&self.sticky).get(format) {
                return reply.clone();
            }
        }
        lock(&self.queue)
            .pop_front()
            .unwrap_or_else(|| MockReply::Text("mock response".to_string()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, VoleraError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VoleraError> {
        Ok(())
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn run(&self, request: LlmRequest) -> Result<LlmResponse, VoleraError> {
        lock(&self.requests).push(request.clone());
        let reply = self.next_reply(&request);

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            MockReply::Text(text) => Ok(LlmResponse {
                id: format!("mock-resp-{}", uuid::Uuid::new_v4()),
                model: request.model,
                new_messages: vec![
                    ModelMessage::user(request.prompt),
                    ModelMessage::assistant(text.clone()),
                ],
                text,
                tool_calls: Vec::new(),
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 20,
                },
            }),
            MockReply::Transient(message) => Err(VoleraError::transient_provider(message)),
            MockReply::Fatal(message) => Err(VoleraError::provider(message)),
            MockReply::Hang => {
                std::future::pending::<()>().await;
                Err(VoleraError::Internal("unreachable".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use volera_core::types::ResponseFormat;

    use super::*;

    fn request(format: Option<&str>) -> LlmRequest {
        LlmRequest {
            model: "test-model".into(),
            system: None,
            prompt: "hi".into(),
            history: Vec::new(),
            response_format: format.map(|name| ResponseFormat {
                name: name.into(),
                schema: serde_json::json!({}),
            }),
            deps: None,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn default_response_when_queue_empty() {
        let provider = MockProvider::new();
        let resp = provider.run(request(None)).await.unwrap();
        assert_eq!(resp.text, "mock response");
        assert_eq!(resp.new_messages.len(), 2);
    }

    #[tokio::test]
    async fn queued_responses_returned_in_order() {
        let provider = MockProvider::with_responses(vec!["first".into(), "second".into()]);
        assert_eq!(provider.run(request(None)).await.unwrap().text, "first");
        assert_eq!(provider.run(request(None)).await.unwrap().text, "second");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn format_queues_take_precedence() {
        let provider = MockProvider::with_responses(vec!["general".into()]);
        provider.push_for("plan", MockReply::Text("planned".into()));
        provider.always_for("review", MockReply::Text("reviewed".into()));

        assert_eq!(provider.run(request(Some("plan"))).await.unwrap().text, "planned");
        assert_eq!(provider.run(request(Some("review"))).await.unwrap().text, "reviewed");
        assert_eq!(provider.run(request(Some("review"))).await.unwrap().text, "reviewed");
        assert_eq!(provider.run(request(Some("plan"))).await.unwrap().text, "general");
        assert_eq!(provider.requests_for("review").len(), 2);
    }

    #[tokio::test]
    async fn peak_in_flight_counts_overlapping_calls() {
        let provider = MockProvider::new().with_delay(Duration::from_millis(20));
        let calls = (0..3).map(|_| provider.run(request(None)));
        futures::future::join_all(calls).await;
        assert_eq!(provider.peak_in_flight(), 3);
        provider.run(request(None)).await.unwrap();
        assert_eq!(provider.peak_in_flight(), 3);
    }

    #[tokio::test]
    async fn scripted_errors_keep_their_class() {
        let provider = MockProvider::new();
        provider.push(MockReply::Transient("429".into()));
        provider.push(MockReply::Fatal("400".into()));
        assert!(provider.run(request(None)).await.unwrap_err().is_transient());
        assert!(!provider.run(request(None)).await.unwrap_err().is_transient());
    }
}
