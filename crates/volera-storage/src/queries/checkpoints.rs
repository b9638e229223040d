// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph checkpoint rows.

use chrono::{DateTime, Utc};
use rusqlite::params;
use volera_core::VoleraError;
use volera_core::types::Checkpoint;

use crate::database::{Database, map_tr_err};
use crate::queries::parse_column;

fn ts(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Insert or replace a thread's checkpoint, expiring at `expires_at`.
pub async fn put_checkpoint(
    db: &Database,
    checkpoint: &Checkpoint,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<(), VoleraError> {
    let checkpoint = checkpoint.clone();
    let state = serde_json::to_string(&checkpoint.state).map_err(|e| VoleraError::Storage {
        source: Box::new(e),
    })?;
    let step = i64::try_from(checkpoint.step).unwrap_or(i64::MAX);
    let (now, expires_at) = (ts(now), ts(expires_at));
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO checkpoints (thread_id, state, status, next_node, step, updated_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(thread_id) DO UPDATE SET
                    state = excluded.state,
                    status = excluded.status,
                    next_node = excluded.next_node,
                    step = excluded.step,
                    updated_at = excluded.updated_at,
                    expires_at = excluded.expires_at",
                params![
                    checkpoint.thread_id,
                    state,
                    checkpoint.status.to_string(),
                    checkpoint.next,
                    step,
                    now,
                    expires_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a thread's checkpoint unless it has expired at `now`.
pub async fn get_checkpoint(
    db: &Database,
    thread_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Checkpoint>, VoleraError> {
    let thread_id = thread_id.to_string();
    let now = ts(now);
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT thread_id, state, status, next_node, step FROM checkpoints
                 WHERE thread_id = ?1 AND expires_at > ?2",
                params![thread_id, now],
                |row| {
                    let state: String = row.get(1)?;
                    let state = serde_json::from_str(&state).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                    let step: i64 = row.get(4)?;
                    Ok(Checkpoint {
                        thread_id: row.get(0)?,
                        state,
                        status: parse_column(row, 2)?,
                        next: row.get(3)?,
                        step: u64::try_from(step).unwrap_or(0),
                    })
                },
            );
            match result {
                Ok(cp) => Ok(Some(cp)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_checkpoint(db: &Database, thread_id: &str) -> Result<(), VoleraError> {
    let thread_id = thread_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM checkpoints WHERE thread_id = ?1", params![thread_id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete every checkpoint expired at `now`. Returns the number removed.
pub async fn purge_expired(db: &Database, now: DateTime<Utc>) -> Result<usize, VoleraError> {
    let now = ts(now);
    db.connection()
        .call(move |conn| {
            let removed =
                conn.execute("DELETE FROM checkpoints WHERE expires_at <= ?1", params![now])?;
            Ok(removed)
        })
        .await
        .map_err(map_tr_err)
}
