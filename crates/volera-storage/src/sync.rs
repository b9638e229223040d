// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciler that copies buffered sessions and messages into the durable
//! store.
//!
//! A pass visits every session that is closed-but-unsynced or has unsynced
//! messages. For each it resolves (or creates) the remote chat document, then
//! pushes messages in insertion order. Each local row moves with a single
//! guarded UPDATE after its remote write succeeds, so replaying a pass over
//! synced rows does nothing. Pushes are at-least-once: a message whose remote
//! document already exists is treated as delivered.
//!
//! A failed push marks that message (and its session) `sync_failed` and stops
//! the session for this pass so later messages never overtake it.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use volera_config::model::{RemoteStoreConfig, SyncConfig};
use volera_core::{DurableStore, VoleraError};

use crate::database::Database;
use crate::models::{BufferedMessage, SessionRecord, SyncStatus};
use crate::queries;

/// Counters from one reconciler pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub sessions_visited: usize,
    pub chats_created: usize,
    pub chats_updated: usize,
    pub messages_synced: usize,
    pub messages_failed: usize,
    pub sessions_completed: usize,
}

pub struct SyncService {
    db: Database,
    store: Arc<dyn DurableStore>,
    chats_collection: String,
    messages_collection: String,
    batch_size: usize,
    interval: Duration,
}

fn to_document<T: Serialize>(value: &T) -> Result<serde_json::Value, VoleraError> {
    serde_json::to_value(value).map_err(|e| VoleraError::Internal(format!("serialize document: {e}")))
}

impl SyncService {
    pub fn new(
        db: Database,
        store: Arc<dyn DurableStore>,
        sync: &SyncConfig,
        remote: &RemoteStoreConfig,
    ) -> Self {
        Self {
            db,
            store,
            chats_collection: remote.chats_collection.clone(),
            messages_collection: remote.messages_collection.clone(),
            batch_size: sync.batch_size.max(1),
            interval: Duration::from_secs(sync.interval_secs.max(1)),
        }
    }

    /// Run one reconciliation pass.
    pub async fn run_once(&self) -> Result<SyncReport, VoleraError> {
        let mut report = SyncReport::default();
        let sessions = queries::sessions::sessions_needing_sync(&self.db, self.batch_size).await?;

        for session in &sessions {
            report.sessions_visited += 1;
            if let Err(e) = self.sync_session(session, &mut report).await {
                warn!(
                    chat_id = %session.session_id,
                    error = %e,
                    "session sync failed, will retry next pass"
                );
                queries::sessions::mark_session_failed(&self.db, &session.session_id, &e.to_string())
                    .await?;
            }
        }

        if report.messages_synced > 0 || report.messages_failed > 0 || report.chats_created > 0 {
            info!(
                sessions = report.sessions_visited,
                chats_created = report.chats_created,
                synced = report.messages_synced,
                failed = report.messages_failed,
                completed = report.sessions_completed,
                "sync pass complete"
            );
        } else {
            debug!("sync pass found nothing to do");
        }
        Ok(report)
    }

    async fn sync_session(
        &self,
        session: &SessionRecord,
        report: &mut SyncReport,
    ) -> Result<(), VoleraError> {
        self.ensure_chat(session, report).await?;

        let messages =
            queries::messages::unsynced_messages(&self.db, &session.session_id, self.batch_size)
                .await?;
        for message in &messages {
            if let Err(e) = self.push_message(message).await {
                queries::messages::mark_message_failed(&self.db, &message.message_id, &e.to_string())
                    .await?;
                report.messages_failed += 1;
                return Err(e);
            }
            if queries::messages::mark_message_synced(&self.db, &message.message_id).await? {
                report.messages_synced += 1;
            }
        }

        let drained = messages.len() < self.batch_size;
        if drained
            && session.status != SyncStatus::Active
            && queries::sessions::mark_session_synced(&self.db, &session.session_id).await?
        {
            report.sessions_completed += 1;
        }
        Ok(())
    }

    /// Resolve the remote chat for a session, creating it on first sight and
    /// refreshing title and end time when they changed locally.
    async fn ensure_chat(
        &self,
        session: &SessionRecord,
        report: &mut SyncReport,
    ) -> Result<(), VoleraError> {
        let chat = session.to_chat();
        let existing = self
            .store
            .get_document(&self.chats_collection, &chat.chat_id)
            .await?;

        match existing {
            None => {
                self.store
                    .create_document(&self.chats_collection, &chat.chat_id, to_document(&chat)?)
                    .await?;
                report.chats_created += 1;
                debug!(chat_id = %chat.chat_id, "remote chat created");
            }
            Some(doc) => {
                let title = serde_json::Value::String(chat.title.clone());
                let end_time = to_document(&chat.end_time)?;
                let stale = doc.data.get("title") != Some(&title)
                    || doc.data.get("end_time").unwrap_or(&serde_json::Value::Null) != &end_time;
                if stale {
                    self.store
                        .update_document(
                            &self.chats_collection,
                            &chat.chat_id,
                            serde_json::json!({ "title": title, "end_time": end_time }),
                        )
                        .await?;
                    report.chats_updated += 1;
                }
            }
        }
        Ok(())
    }

    async fn push_message(&self, message: &BufferedMessage) -> Result<(), VoleraError> {
        let already = self
            .store
            .get_document(&self.messages_collection, &message.message_id)
            .await?;
        if already.is_some() {
            debug!(message_id = %message.message_id, "remote message already present");
            return Ok(());
        }
        self.store
            .create_document(
                &self.messages_collection,
                &message.message_id,
                to_document(&message.to_chat_message())?,
            )
            .await?;
        Ok(())
    }

    /// Run passes at the configured interval until `cancel` fires. A pass in
    /// progress always completes.
    pub async fn run_loop(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "sync loop started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        warn!(error = %e, "sync pass aborted");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("sync loop shutting down");
                    break;
                }
            }
        }
    }

    /// Spawn [`run_loop`](Self::run_loop) on the runtime.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run_loop(cancel).await })
    }
}
