// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent runtime for Volera.
//!
//! The [`AgentRuntime`] is the single path from an agent node to the model:
//! - Checks the user's credits before the call
//! - Bounds every attempt with a deadline
//! - Retries transient failures with exponential backoff
//! - Deducts the call's cost once, keyed by the provider's response id
//!
//! [`ProgressChannel`] carries status events from the pipeline to the client,
//! and [`shutdown`] turns process signals into a cancellation token.

pub mod progress;
pub mod retry;
pub mod runtime;
pub mod shutdown;
pub mod structured;

pub use progress::ProgressChannel;
pub use retry::RetryPolicy;
pub use runtime::{AgentRuntime, Prompt};
pub use structured::{parse_json_output, Structured};
