// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Volera integration tests.
//!
//! Provides mock collaborators and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockProvider`] - Mock LLM provider with scripted replies
//! - [`MockSearch`] / [`MockCrawler`] - In-memory search results and pages
//! - [`InMemoryDocumentStore`] - Durable store stand-in
//! - [`RecordingSink`] - Client channel that records events
//! - [`TestHarness`] - The research pipeline wired to all of the above

pub mod harness;
pub mod mock_provider;
pub mod mock_store;
pub mod mock_tools;
pub mod recording_sink;

pub use harness::{TestHarness, TestHarnessBuilder, TEST_USER};
pub use mock_provider::{MockProvider, MockReply};
pub use mock_store::InMemoryDocumentStore;
pub use mock_tools::{hit, image_hit, MockCrawler, MockSearch};
pub use recording_sink::RecordingSink;
