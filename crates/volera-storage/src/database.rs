// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and migrations.
//!
//! All reads and writes go through tokio-rusqlite's single background thread.
//! `Database` is cheap to clone; clones share that thread.

use std::path::Path;

use tracing::{debug, info};
use volera_core::VoleraError;

use crate::migrations::run_migrations;

/// Convert a tokio-rusqlite error into VoleraError::Storage.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> VoleraError {
    VoleraError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the local SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs and run
    /// migrations. Parent directories are created as needed.
    pub async fn open(path: &str) -> Result<Self, VoleraError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| VoleraError::Storage {
                source: Box::new(e),
            })?;
        }
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| VoleraError::Storage {
                source: Box::new(e),
            })?;
        let db = Self::init(conn, true).await?;
        info!(path, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database with the full schema.
    pub async fn open_in_memory() -> Result<Self, VoleraError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| VoleraError::Storage {
                source: Box::new(e),
            })?;
        Self::init(conn, false).await
    }

    async fn init(conn: tokio_rusqlite::Connection, wal: bool) -> Result<Self, VoleraError> {
        let applied = conn
            .call(move |conn| -> Result<usize, VoleraError> {
                let pragmas = if wal {
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA busy_timeout = 5000;
                     PRAGMA foreign_keys = ON;"
                } else {
                    "PRAGMA busy_timeout = 5000;
                     PRAGMA foreign_keys = ON;"
                };
                conn.execute_batch(pragmas).map_err(|e| VoleraError::Storage {
                    source: Box::new(e),
                })?;
                run_migrations(conn)
            })
            .await
            .map_err(|e| VoleraError::Storage {
                source: Box::new(e),
            })?;
        debug!(applied, "migrations applied");
        Ok(Self { conn })
    }

    /// The shared connection. Other crates (the credit ledger) issue their own
    /// queries through it.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Round-trips a trivial query.
    pub async fn ping(&self) -> Result<(), VoleraError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint the WAL into the main database file. Called on shutdown.
    pub async fn close(&self) -> Result<(), VoleraError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_file_and_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("volera.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        assert!(path.exists());

        let tables: Vec<String> = db
            .connection()
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(map_tr_err)
            .unwrap();
        for expected in [
            "checkpoints",
            "credit_daily_rollup",
            "credit_transactions",
            "session_messages",
            "sessions",
            "user_credits",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopening_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("volera.db");
        let first = Database::open(path.to_str().unwrap()).await.unwrap();
        first.close().await.unwrap();
        drop(first);
        let second = Database::open(path.to_str().unwrap()).await.unwrap();
        second.ping().await.unwrap();
    }

    #[tokio::test]
    async fn in_memory_database_has_schema() {
        let db = Database::open_in_memory().await.unwrap();
        let count: i64 = db
            .connection()
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            })
            .await
            .map_err(map_tr_err)
            .unwrap();
        assert_eq!(count, 0);
    }
}
