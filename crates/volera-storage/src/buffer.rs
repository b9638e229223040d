// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local append-only conversation log.
//!
//! Every message received or emitted on a live conversation is appended here
//! first. The [`SyncService`](crate::sync::SyncService) later copies rows into
//! the durable store.

use tracing::{debug, info};
use volera_core::VoleraError;
use volera_core::types::{Chat, MessageRole};

use crate::database::Database;
use crate::models::{BufferedMessage, SessionRecord, timestamp_now};
use crate::queries;

#[derive(Clone)]
pub struct SessionBuffer {
    db: Database,
}

impl SessionBuffer {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Start (or resume) a session for `chat_id`.
    pub async fn open(
        &self,
        chat_id: &str,
        user_id: &str,
        focus_mode: Option<&str>,
        files: &[String],
    ) -> Result<SessionRecord, VoleraError> {
        let chat = Chat {
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
            start_time: timestamp_now(),
            end_time: None,
            title: String::new(),
            focus_mode: focus_mode.map(str::to_string),
            files: files.to_vec(),
        };
        let record = queries::sessions::open_session(&self.db, &chat).await?;
        debug!(chat_id, user_id, "session opened");
        Ok(record)
    }

    pub async fn append(
        &self,
        chat_id: &str,
        role: MessageRole,
        content: &str,
        metadata: serde_json::Value,
    ) -> Result<BufferedMessage, VoleraError> {
        let message =
            queries::messages::insert_message(&self.db, chat_id, role, content, metadata).await?;
        debug!(chat_id, %role, seq = message.seq, "message buffered");
        Ok(message)
    }

    /// Mark the session closed. Its remaining rows become eligible for sync.
    pub async fn close(&self, chat_id: &str) -> Result<bool, VoleraError> {
        let closed = queries::sessions::close_session(&self.db, chat_id).await?;
        if closed {
            debug!(chat_id, "session closed");
        }
        Ok(closed)
    }

    pub async fn session(&self, chat_id: &str) -> Result<Option<SessionRecord>, VoleraError> {
        queries::sessions::get_session(&self.db, chat_id).await
    }

    pub async fn messages(&self, chat_id: &str) -> Result<Vec<BufferedMessage>, VoleraError> {
        queries::messages::get_messages(&self.db, chat_id, None).await
    }

    /// Flip sessions left `active` by a previous process to `pending`.
    pub async fn recover_stale(&self) -> Result<usize, VoleraError> {
        let recovered = queries::sessions::mark_stale_sessions(&self.db).await?;
        if recovered > 0 {
            info!(recovered, "stale sessions queued for sync");
        }
        Ok(recovered)
    }
}
