// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for the session buffer.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use volera_core::types::{Chat, ChatMessage, MessageRole};

/// Longest chat title taken from the first human message, in characters.
pub const TITLE_MAX_CHARS: usize = 80;

/// Reconciliation state of a buffered session or message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncStatus {
    /// The conversation is live. Sessions only.
    Active,
    /// Waiting for the reconciler.
    Pending,
    Synced,
    /// The last push failed; retried on the next pass.
    SyncFailed,
}

/// A buffered conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub title: String,
    pub focus_mode: Option<String>,
    pub files: Vec<String>,
    pub status: SyncStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub start_time: String,
    pub end_time: Option<String>,
}

impl SessionRecord {
    /// The durable-store view of this session.
    pub fn to_chat(&self) -> Chat {
        Chat {
            chat_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            title: self.title.clone(),
            focus_mode: self.focus_mode.clone(),
            files: self.files.clone(),
        }
    }
}

/// A buffered message. `seq` gives the insertion order within the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferedMessage {
    pub seq: i64,
    pub message_id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub metadata: serde_json::Value,
    pub status: SyncStatus,
    pub attempts: i64,
    pub created_at: String,
}

impl BufferedMessage {
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            message_id: self.message_id.clone(),
            chat_id: self.session_id.clone(),
            role: self.role,
            content: self.content.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Current UTC time in the format every table uses.
pub fn timestamp_now() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// First [`TITLE_MAX_CHARS`] characters of `content`, trimmed.
pub fn title_from(content: &str) -> String {
    content.trim().chars().take(TITLE_MAX_CHARS).collect::<String>().trim_end().to_string()
}
