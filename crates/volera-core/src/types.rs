// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the pipeline, its collaborators, and the storage layer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of external collaborator behind an adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Search,
    Crawler,
    RemoteStore,
}

// --- Conversation input ---

/// How much effort the pipeline should spend on a query.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Display,
    EnumString,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OptimizationMode {
    Fast,
    #[default]
    Balanced,
    Quality,
}

/// The last inbound user payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WsMessage {
    pub content: String,
    #[serde(default)]
    pub focus_mode: Option<String>,
    #[serde(default)]
    pub optimization_mode: OptimizationMode,
    #[serde(default)]
    pub files: Vec<String>,
}

// --- Model calls ---

/// Role of a single model message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModelRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model.
    pub arguments: String,
}

/// One model-request or model-response record in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: ModelRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ModelMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ModelRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ModelRole::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ModelRole::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// JSON schema the model is asked to answer with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    pub name: String,
    pub schema: serde_json::Value,
}

/// A request to an LLM provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmRequest {
    pub model: String,
    #[serde(default)]
    pub system: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub history: Vec<ModelMessage>,
    #[serde(default)]
    pub response_format: Option<ResponseFormat>,
    /// Per-call dependencies made available to the prompt (user profile, locale...).
    #[serde(default)]
    pub deps: Option<serde_json::Value>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Token usage reported for a single call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// A completed model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Provider-assigned response id. Used as the credit ledger key.
    pub id: String,
    pub model: String,
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Messages produced by this call, to be appended to the caller's history.
    #[serde(default)]
    pub new_messages: Vec<ModelMessage>,
    #[serde(default)]
    pub usage: TokenUsage,
}

/// Credit category of a metered operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "amount")]
pub enum Charge {
    Text,
    Image,
    Research,
    /// An explicit amount of credits.
    Amount(i64),
}

impl std::fmt::Display for Charge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Image => f.write_str("image"),
            Self::Research => f.write_str("research"),
            Self::Amount(n) => write!(f, "amount:{n}"),
        }
    }
}

// --- Research records ---

/// A labelled product attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Specification {
    pub label: String,
    pub value: String,
}

/// A product extracted from a retailer page.
///
/// `name`, `current_price`, and `url` are mandatory; `product_id` is filled in
/// by the researcher from the URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProductRecord {
    #[serde(default)]
    #[schemars(skip)]
    pub product_id: String,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub current_price: f64,
    #[serde(default)]
    pub original_price: Option<f64>,
    #[serde(default)]
    pub discount: Option<String>,
    pub url: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub rating_count: Option<u64>,
    #[serde(default)]
    pub specifications: Vec<Specification>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    #[schemars(skip)]
    pub relevance_score: f64,
}

impl ProductRecord {
    /// Whether the mandatory fields carry usable values.
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.url.trim().is_empty()
            && self.current_price.is_finite()
            && self.current_price >= 0.0
    }

    /// Text used to score the record against a query.
    pub fn text_projection(&self) -> String {
        let mut parts: Vec<&str> = vec![self.name.as_str()];
        if let Some(brand) = &self.brand {
            parts.push(brand);
        }
        if let Some(category) = &self.category {
            parts.push(category);
        }
        if let Some(description) = &self.description {
            parts.push(description);
        }
        for feature in &self.features {
            parts.push(feature);
        }
        for spec in &self.specifications {
            parts.push(&spec.label);
            parts.push(&spec.value);
        }
        parts.join(" ")
    }
}

/// A planned search: which site to search and with what query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct SearchQuery {
    pub site: String,
    pub query: String,
    #[serde(default)]
    pub source: String,
}

impl SearchQuery {
    /// Identity used to avoid re-running a search within one conversation.
    pub fn key(&self) -> (String, String) {
        (self.site.clone(), self.query.clone())
    }
}

// --- External tool payloads ---

/// Web or image search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    #[default]
    Web,
    Image,
}

/// A search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// At most 10.
    pub num_results: u8,
    #[serde(default)]
    pub kind: SearchKind,
    #[serde(default)]
    pub site: Option<String>,
}

impl SearchRequest {
    pub fn web(query: impl Into<String>, num_results: u8) -> Self {
        Self {
            query: query.into(),
            num_results: num_results.min(10),
            kind: SearchKind::Web,
            site: None,
        }
    }

    pub fn images(query: impl Into<String>, num_results: u8) -> Self {
        Self {
            query: query.into(),
            num_results: num_results.min(10),
            kind: SearchKind::Image,
            site: None,
        }
    }
}

/// A single search hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_height: Option<u32>,
    #[serde(default)]
    pub image_width: Option<u32>,
}

/// Per-request crawler switches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlOptions {
    pub bypass_cache: bool,
    pub excluded_tags: Vec<String>,
    pub exclude_external_links: bool,
}

/// Outcome of fetching one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub url: String,
    pub success: bool,
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl FetchResult {
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: false,
            markdown: String::new(),
            error: Some(error.into()),
        }
    }
}

// --- Chats ---

/// Author of a chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    Human,
    Assistant,
}

/// A conversation as stored in the durable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub chat_id: String,
    pub user_id: String,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    pub title: String,
    #[serde(default)]
    pub focus_mode: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

/// A single turn of a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: String,
    pub chat_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

// --- Durable store ---

/// A document in a remote collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: serde_json::Value,
}

/// A predicate for `list_documents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreQuery {
    Equal(String, serde_json::Value),
    OrderAsc(String),
    OrderDesc(String),
    Limit(u32),
}

// --- Checkpoints ---

/// Where a conversation's graph run stands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CheckpointStatus {
    /// A node is scheduled (`next`) but has not completed.
    Running,
    /// Waiting for user input.
    Suspended,
    /// Reached END.
    Completed,
}

/// Persisted graph state for one conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub state: serde_json::Value,
    pub status: CheckpointStatus,
    /// Node to run next when `status` is `Running`.
    #[serde(default)]
    pub next: Option<String>,
    pub step: u64,
}
