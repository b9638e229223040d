// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Node and sink-hook traits.

use std::future::Future;

use async_trait::async_trait;
use volera_core::VoleraError;

use crate::command::{Command, Sink};
use crate::state::GraphState;

/// Per-run information handed to every node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub thread_id: String,
    /// Total node invocations on this thread before the current one.
    pub step: u64,
}

/// A named step of the graph.
#[async_trait]
pub trait Node<S: GraphState>: Send + Sync {
    async fn run(&self, state: &S, config: &RunConfig) -> Result<Command<S::Update>, VoleraError>;
}

/// Adapts an async closure over an owned state snapshot into a [`Node`].
pub struct FnNode<F>(pub F);

#[async_trait]
impl<S, F, Fut> Node<S> for FnNode<F>
where
    S: GraphState,
    F: Fn(S, RunConfig) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Command<S::Update>, VoleraError>> + Send,
{
    async fn run(&self, state: &S, config: &RunConfig) -> Result<Command<S::Update>, VoleraError> {
        (self.0)(state.clone(), config.clone()).await
    }
}

/// Runs right before the executor yields at a sink, with mutable access to
/// the state that is about to be checkpointed. Used to settle background work
/// started by nodes.
#[async_trait]
pub trait SinkHook<S: GraphState>: Send + Sync {
    async fn on_sink(&self, state: &mut S, sink: Sink) -> Result<(), VoleraError>;
}
