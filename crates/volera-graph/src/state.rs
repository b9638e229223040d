// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The contract a conversation state implements to run on a graph.

use serde::Serialize;
use serde::de::DeserializeOwned;
use volera_core::VoleraError;

/// State shared by the nodes of one conversation.
///
/// The executor owns the state. Nodes read a snapshot and return an update;
/// the executor merges it with [`apply`](GraphState::apply), passing the name
/// of the node that produced it so per-node outputs can only be written by
/// their owner.
pub trait GraphState:
    Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Partial update produced by a node or by caller input.
    type Update: Send + 'static;

    /// Merge `update`, produced by `node` (or [`INPUT`](crate::INPUT)).
    fn apply(&mut self, node: &str, update: Self::Update);

    /// Node to continue at when a suspended run is resumed.
    fn resume_node(&self) -> Option<String>;

    /// Record a node failure before control passes to the error node.
    fn record_error(&mut self, node: &str, error: &VoleraError);
}
