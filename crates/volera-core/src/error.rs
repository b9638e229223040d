// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Volera.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Volera traits and pipeline stages.
#[derive(Debug, Error)]
pub enum VoleraError {
    /// Configuration errors (invalid TOML, missing keys, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Local storage errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Client channel errors (socket closed, send buffer full).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM provider errors. `transient` marks failures worth retrying
    /// (rate limits, 5xx, dropped connections).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        transient: bool,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Search API failure.
    #[error("search error: {message}")]
    Search { message: String },

    /// Page fetch failure.
    #[error("crawl error for {url}: {message}")]
    Crawl { url: String, message: String },

    /// Durable remote store failure.
    #[error("remote store error: {message}")]
    RemoteStore {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The user's balance does not cover the requested operation.
    #[error("insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: i64, available: i64 },

    /// The projected daily spend would exceed the configured cap.
    #[error("daily credit limit of {limit} would be exceeded (projected {projected})")]
    DailyLimitExceeded { limit: i64, projected: i64 },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// A research plan produced no products.
    #[error("no results for plan: {query}")]
    NoResults { query: String },

    /// Model output did not satisfy its schema.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Graph definition or execution invariant violated.
    #[error("graph error: {0}")]
    Graph(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VoleraError {
    /// Shorthand for a non-retryable provider error without a source.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            transient: false,
            source: None,
        }
    }

    /// Shorthand for a retryable provider error without a source.
    pub fn transient_provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            transient: true,
            source: None,
        }
    }

    /// Whether the agent runtime should retry the failed call.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Provider { transient, .. } => *transient,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}
