// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session rows.

use rusqlite::params;
use volera_core::VoleraError;
use volera_core::types::Chat;

use crate::database::{Database, map_tr_err};
use crate::models::{SessionRecord, SyncStatus, timestamp_now};
use crate::queries::{json_column, parse_column};

const SESSION_COLUMNS: &str = "session_id, user_id, title, focus_mode, files, status, attempts, \
                               last_error, start_time, end_time";

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        session_id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        focus_mode: row.get(3)?,
        files: json_column(row, 4)?,
        status: parse_column(row, 5)?,
        attempts: row.get(6)?,
        last_error: row.get(7)?,
        start_time: row.get(8)?,
        end_time: row.get(9)?,
    })
}

/// Insert a session as `active`, or reactivate it if it already exists.
///
/// Reactivation clears `end_time` so a resumed conversation is live again;
/// the original `start_time` and title are kept.
pub async fn open_session(db: &Database, chat: &Chat) -> Result<SessionRecord, VoleraError> {
    let chat = chat.clone();
    let files = serde_json::to_string(&chat.files).map_err(|e| VoleraError::Storage {
        source: Box::new(e),
    })?;
    let now = timestamp_now();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (session_id, user_id, title, focus_mode, files, status,
                                       start_time, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, ?7)
                 ON CONFLICT(session_id) DO UPDATE SET
                    status = 'active',
                    end_time = NULL,
                    updated_at = excluded.updated_at",
                params![
                    chat.chat_id,
                    chat.user_id,
                    chat.title,
                    chat.focus_mode,
                    files,
                    chat.start_time,
                    now,
                ],
            )?;
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1"),
                params![chat.chat_id],
                row_to_session,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Get a session by id.
pub async fn get_session(db: &Database, id: &str) -> Result<Option<SessionRecord>, VoleraError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1"),
                params![id],
                row_to_session,
            );
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List sessions, optionally filtered by status, oldest first.
pub async fn list_sessions(
    db: &Database,
    status: Option<SyncStatus>,
) -> Result<Vec<SessionRecord>, VoleraError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY start_time ASC, session_id ASC"
            ))?;
            let rows = stmt
                .query_map(params![status], row_to_session)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Close a live session: it becomes `pending` and gets an `end_time`.
/// Returns `false` if the session was not active.
pub async fn close_session(db: &Database, id: &str) -> Result<bool, VoleraError> {
    let id = id.to_string();
    let now = timestamp_now();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions SET status = 'pending', end_time = ?2, updated_at = ?2
                 WHERE session_id = ?1 AND status = 'active'",
                params![id, now],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Flip every `active` session to `pending`.
///
/// Run at startup: anything still active belongs to a process that did not
/// shut down cleanly, and its turns must reach the durable store.
pub async fn mark_stale_sessions(db: &Database) -> Result<usize, VoleraError> {
    let now = timestamp_now();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions SET status = 'pending', updated_at = ?1 WHERE status = 'active'",
                params![now],
            )?;
            Ok(changed)
        })
        .await
        .map_err(map_tr_err)
}

/// Sessions the reconciler should visit: closed sessions not yet synced, and
/// any session with unsynced messages. Fewest failed attempts first, so a
/// session that keeps failing cannot hold the whole batch.
pub async fn sessions_needing_sync(
    db: &Database,
    limit: usize,
) -> Result<Vec<SessionRecord>, VoleraError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions s
                 WHERE s.status IN ('pending', 'sync_failed')
                    OR EXISTS (SELECT 1 FROM session_messages m
                               WHERE m.session_id = s.session_id AND m.status != 'synced')
                 ORDER BY s.attempts ASC, s.start_time ASC, s.session_id ASC
                 LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map(params![limit], row_to_session)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a closed session synced. Guarded so an active or already-synced row is
/// left untouched; returns whether the row moved.
pub async fn mark_session_synced(db: &Database, id: &str) -> Result<bool, VoleraError> {
    let id = id.to_string();
    let now = timestamp_now();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions SET status = 'synced', last_error = NULL, updated_at = ?2
                 WHERE session_id = ?1 AND status IN ('pending', 'sync_failed')",
                params![id, now],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed reconciliation. Live sessions keep their `active` status.
pub async fn mark_session_failed(db: &Database, id: &str, error: &str) -> Result<(), VoleraError> {
    let id = id.to_string();
    let error = error.to_string();
    let now = timestamp_now();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET
                    status = CASE status WHEN 'active' THEN 'active' ELSE 'sync_failed' END,
                    attempts = attempts + 1,
                    last_error = ?2,
                    updated_at = ?3
                 WHERE session_id = ?1",
                params![id, error, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
