// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `volera sync`: one reconciler pass for operators.

use std::sync::Arc;

use tracing::info;
use volera_config::VoleraConfig;
use volera_core::VoleraError;
use volera_storage::{AppwriteStore, Database, SessionBuffer, SyncService};

use crate::serve::init_tracing;

/// Recovers stale sessions, runs a single pass, and prints its report as JSON.
///
/// Must not run against a database a live `volera serve` is using: stale
/// recovery would close that process's active sessions.
pub async fn run_sync(config: VoleraConfig) -> Result<(), VoleraError> {
    init_tracing(&config.agent.log_level);

    let database = Database::open(&config.storage.database_path).await?;
    SessionBuffer::new(database.clone()).recover_stale().await?;

    let store = AppwriteStore::new(&config.store)?;
    let service = SyncService::new(database.clone(), Arc::new(store), &config.sync, &config.store);
    let report = service.run_once().await?;
    database.close().await?;

    info!(synced = report.messages_synced, failed = report.messages_failed, "sync finished");
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|e| VoleraError::Internal(format!("failed to render sync report: {e}")))?;
    println!("{rendered}");
    Ok(())
}
