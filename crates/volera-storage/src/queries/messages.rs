// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Buffered message rows.

use rusqlite::params;
use volera_core::VoleraError;
use volera_core::types::MessageRole;

use crate::database::{Database, map_tr_err};
use crate::models::{BufferedMessage, SyncStatus, timestamp_now, title_from};
use crate::queries::{json_column, parse_column};

const MESSAGE_COLUMNS: &str = "seq, message_id, session_id, role, content, metadata, status, \
                               attempts, created_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<BufferedMessage> {
    Ok(BufferedMessage {
        seq: row.get(0)?,
        message_id: row.get(1)?,
        session_id: row.get(2)?,
        role: parse_column(row, 3)?,
        content: row.get(4)?,
        metadata: json_column(row, 5)?,
        status: parse_column(row, 6)?,
        attempts: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Append a message to a session. Rows always start `pending`.
///
/// The first human message also fills in the session title if it is still
/// empty. Both writes happen in one transaction.
pub async fn insert_message(
    db: &Database,
    session_id: &str,
    role: MessageRole,
    content: &str,
    metadata: serde_json::Value,
) -> Result<BufferedMessage, VoleraError> {
    let message = BufferedMessage {
        seq: 0,
        message_id: uuid::Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        role,
        content: content.to_string(),
        metadata,
        status: SyncStatus::Pending,
        attempts: 0,
        created_at: timestamp_now(),
    };
    let metadata = serde_json::to_string(&message.metadata).map_err(|e| VoleraError::Storage {
        source: Box::new(e),
    })?;
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO session_messages (message_id, session_id, role, content, metadata,
                                               status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)",
                params![
                    message.message_id,
                    message.session_id,
                    message.role.to_string(),
                    message.content,
                    metadata,
                    message.created_at,
                ],
            )?;
            let seq = tx.last_insert_rowid();
            if message.role == MessageRole::Human {
                tx.execute(
                    "UPDATE sessions SET title = ?2 WHERE session_id = ?1 AND title = ''",
                    params![message.session_id, title_from(&message.content)],
                )?;
            }
            tx.commit()?;
            Ok(BufferedMessage { seq, ..message })
        })
        .await
        .map_err(map_tr_err)
}

/// Messages of a session in insertion order, optionally only the last `limit`.
pub async fn get_messages(
    db: &Database,
    session_id: &str,
    limit: Option<i64>,
) -> Result<Vec<BufferedMessage>, VoleraError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM (
                    SELECT {MESSAGE_COLUMNS} FROM session_messages
                    WHERE session_id = ?1 ORDER BY seq DESC LIMIT ?2
                 ) ORDER BY seq ASC"
            ))?;
            let rows = stmt
                .query_map(params![session_id, limit.unwrap_or(-1)], row_to_message)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Unsynced messages of a session, oldest first.
pub async fn unsynced_messages(
    db: &Database,
    session_id: &str,
    limit: usize,
) -> Result<Vec<BufferedMessage>, VoleraError> {
    let session_id = session_id.to_string();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM session_messages
                 WHERE session_id = ?1 AND status != 'synced'
                 ORDER BY seq ASC LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![session_id, limit], row_to_message)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Single-row transition to `synced`. Returns `false` if the row was already
/// synced (or does not exist).
pub async fn mark_message_synced(db: &Database, message_id: &str) -> Result<bool, VoleraError> {
    let message_id = message_id.to_string();
    let now = timestamp_now();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE session_messages SET status = 'synced', synced_at = ?2, last_error = NULL
                 WHERE message_id = ?1 AND status != 'synced'",
                params![message_id, now],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Single-row transition to `sync_failed`, bumping the attempt counter.
pub async fn mark_message_failed(
    db: &Database,
    message_id: &str,
    error: &str,
) -> Result<(), VoleraError> {
    let message_id = message_id.to_string();
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE session_messages
                 SET status = 'sync_failed', attempts = attempts + 1, last_error = ?2
                 WHERE message_id = ?1 AND status != 'synced'",
                params![message_id, error],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Number of messages not yet in the durable store.
pub async fn count_unsynced(db: &Database) -> Result<i64, VoleraError> {
    db.connection()
        .call(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM session_messages WHERE status != 'synced'",
                [],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::sessions::{get_session, open_session};
    use volera_core::types::Chat;

    async fn setup() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        let chat = Chat {
            chat_id: "s1".to_string(),
            user_id: "user-1".to_string(),
            start_time: "2026-01-01T00:00:00.000Z".to_string(),
            end_time: None,
            title: String::new(),
            focus_mode: None,
            files: vec![],
        };
        open_session(&db, &chat).await.unwrap();
        db
    }

    #[tokio::test]
    async fn messages_keep_insertion_order() {
        let db = setup().await;
        for (role, text) in [
            (MessageRole::Human, "first"),
            (MessageRole::Assistant, "second"),
            (MessageRole::Human, "third"),
        ] {
            insert_message(&db, "s1", role, text, serde_json::json!({})).await.unwrap();
        }

        let all = get_messages(&db, "s1", None).await.unwrap();
        let contents: Vec<_> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third"]);
        assert!(all.iter().all(|m| m.status == SyncStatus::Pending));

        let last_two = get_messages(&db, "s1", Some(2)).await.unwrap();
        assert_eq!(last_two[0].content, "second");
        assert_eq!(last_two[1].content, "third");
    }

    #[tokio::test]
    async fn first_human_message_sets_title() {
        let db = setup().await;
        insert_message(&db, "s1", MessageRole::Assistant, "hello", serde_json::json!({}))
            .await
            .unwrap();
        insert_message(&db, "s1", MessageRole::Human, "lightweight laptop under $800", serde_json::json!({}))
            .await
            .unwrap();
        insert_message(&db, "s1", MessageRole::Human, "something else", serde_json::json!({}))
            .await
            .unwrap();

        let session = get_session(&db, "s1").await.unwrap().unwrap();
        assert_eq!(session.title, "lightweight laptop under $800");
    }

    #[tokio::test]
    async fn message_for_unknown_session_is_rejected() {
        let db = setup().await;
        let result =
            insert_message(&db, "nope", MessageRole::Human, "hi", serde_json::json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn sync_transitions_are_single_shot() {
        let db = setup().await;
        let msg = insert_message(&db, "s1", MessageRole::Human, "hi", serde_json::json!({"k": 1}))
            .await
            .unwrap();
        assert_eq!(count_unsynced(&db).await.unwrap(), 1);

        mark_message_failed(&db, &msg.message_id, "remote down").await.unwrap();
        let failed = unsynced_messages(&db, "s1", 10).await.unwrap();
        assert_eq!(failed[0].status, SyncStatus::SyncFailed);
        assert_eq!(failed[0].attempts, 1);

        assert!(mark_message_synced(&db, &msg.message_id).await.unwrap());
        assert!(!mark_message_synced(&db, &msg.message_id).await.unwrap());
        assert_eq!(count_unsynced(&db).await.unwrap(), 0);
        assert!(unsynced_messages(&db, "s1", 10).await.unwrap().is_empty());
    }
}
