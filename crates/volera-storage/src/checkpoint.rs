// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed [`Checkpointer`].
//!
//! Each write pushes the row's expiry forward by the configured TTL, so a
//! conversation's state lives as long as it keeps moving. Expired rows read as
//! missing and are removed by [`SqliteCheckpointer::purge_expired`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};
use volera_config::model::CheckpointConfig;
use volera_core::types::Checkpoint;
use volera_core::{Checkpointer, VoleraError};

use crate::database::Database;
use crate::queries;

pub struct SqliteCheckpointer {
    db: Database,
    ttl: chrono::Duration,
}

impl SqliteCheckpointer {
    pub fn new(db: Database, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self { db, ttl }
    }

    pub fn from_config(db: Database, config: &CheckpointConfig) -> Self {
        Self::new(db, Duration::from_secs(config.ttl_secs))
    }

    /// Remove checkpoints whose TTL has lapsed.
    pub async fn purge_expired(&self) -> Result<usize, VoleraError> {
        let removed = queries::checkpoints::purge_expired(&self.db, Utc::now()).await?;
        if removed > 0 {
            info!(removed, "expired checkpoints purged");
        }
        Ok(removed)
    }
}

#[async_trait]
impl Checkpointer for SqliteCheckpointer {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, VoleraError> {
        queries::checkpoints::get_checkpoint(&self.db, thread_id, Utc::now()).await
    }

    async fn put(&self, checkpoint: Checkpoint) -> Result<(), VoleraError> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);
        debug!(thread_id = %checkpoint.thread_id, step = checkpoint.step, status = %checkpoint.status, "checkpoint saved");
        queries::checkpoints::put_checkpoint(&self.db, &checkpoint, now, expires_at).await
    }

    async fn delete(&self, thread_id: &str) -> Result<(), VoleraError> {
        queries::checkpoints::delete_checkpoint(&self.db, thread_id).await
    }
}
