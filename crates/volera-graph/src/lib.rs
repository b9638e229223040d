// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! State-graph executor for multi-agent conversations.
//!
//! A graph is a set of named [`Node`]s and an entry node. Each node reads the
//! conversation state and returns a [`Command`]: a partial update plus the
//! next hop, which is another node, [`Goto::Human`] (suspend until the user
//! replies) or [`Goto::End`]. The executor merges updates, checkpoints the
//! state through a [`Checkpointer`](volera_core::Checkpointer), and resumes a
//! suspended conversation where it stopped.

pub mod command;
pub mod graph;
pub mod memory;
pub mod node;
pub mod state;

pub use command::{Command, END, Goto, HUMAN, INPUT, Sink};
pub use graph::{CompiledGraph, DEFAULT_RECURSION_LIMIT, GraphOutcome, StateGraph};
pub use memory::MemoryCheckpointer;
pub use node::{FnNode, Node, RunConfig, SinkHook};
pub use state::GraphState;
