// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Volera.
//!
//! This crate provides the error type, shared domain types, the client event
//! schema, and the traits every external collaborator (LLM, search, crawler,
//! durable store, checkpoint store, client channel) implements.

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

pub use error::VoleraError;
pub use events::{InboundEvent, OutboundEvent};
pub use types::{AdapterType, Charge, HealthStatus, ProductRecord, SearchQuery, TokenUsage};

pub use traits::{
    Checkpointer, Crawler, DurableStore, EventSink, LlmProvider, PluginAdapter, SearchTool,
};
