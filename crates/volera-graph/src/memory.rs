// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process checkpointer.

use async_trait::async_trait;
use dashmap::DashMap;
use volera_core::types::Checkpoint;
use volera_core::{Checkpointer, VoleraError};

/// Keeps checkpoints in a concurrent map. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCheckpointer {
    entries: DashMap<String, Checkpoint>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Checkpointer for MemoryCheckpointer {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, VoleraError> {
        Ok(self.entries.get(thread_id).map(|cp| cp.value().clone()))
    }

    async fn put(&self, checkpoint: Checkpoint) -> Result<(), VoleraError> {
        self.entries.insert(checkpoint.thread_id.clone(), checkpoint);
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<(), VoleraError> {
        self.entries.remove(thread_id);
        Ok(())
    }
}
