// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation graph state persistence.

use async_trait::async_trait;

use crate::error::VoleraError;
use crate::types::Checkpoint;

/// Maps a conversation thread id to its latest graph state.
#[async_trait]
pub trait Checkpointer: Send + Sync + 'static {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, VoleraError>;

    /// Replaces the thread's checkpoint.
    async fn put(&self, checkpoint: Checkpoint) -> Result<(), VoleraError>;

    async fn delete(&self, thread_id: &str) -> Result<(), VoleraError>;
}
