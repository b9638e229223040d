// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for Volera's external collaborators.
//!
//! Adapters extend the [`PluginAdapter`] base trait and use `#[async_trait]`
//! for dynamic dispatch compatibility.

pub mod adapter;
pub mod checkpoint;
pub mod crawler;
pub mod provider;
pub mod search;
pub mod sink;
pub mod store;

pub use adapter::PluginAdapter;
pub use checkpoint::Checkpointer;
pub use crawler::Crawler;
pub use provider::LlmProvider;
pub use search::SearchTool;
pub use sink::EventSink;
pub use store::DurableStore;
