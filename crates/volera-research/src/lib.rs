// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The shopping research pipeline.
//!
//! Four agents cooperate on a [`ConversationState`]: the planner turns the
//! user's request into search queries or a clarifying question, the
//! researcher searches, fetches and extracts products, the reviewer filters
//! them, and the responder presents the accepted products. They run as nodes
//! of a `volera-graph` state graph built by [`build_research_graph`].

pub mod context;
pub mod images;
pub mod nodes;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod state;

pub use context::ResearchContext;
pub use images::{validate_images, ImageTasks};
pub use nodes::RETRY_PROMPT;
pub use pipeline::{build_research_graph, run_turn, ResearchGraph};
pub use state::{ConversationState, SessionInfo, StateUpdate};
