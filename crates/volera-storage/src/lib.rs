// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local persistence for Volera.
//!
//! A WAL-mode SQLite database with embedded migrations holds the session
//! buffer, graph checkpoints, and the credit tables. All access is serialized
//! through one `tokio-rusqlite` connection. The [`SyncService`] reconciles the
//! buffer into a remote [`DurableStore`](volera_core::DurableStore), for which
//! [`AppwriteStore`] is the REST implementation.

pub mod buffer;
pub mod checkpoint;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod remote;
pub mod sync;

pub use buffer::SessionBuffer;
pub use checkpoint::SqliteCheckpointer;
pub use database::Database;
pub use models::*;
pub use remote::AppwriteStore;
pub use sync::{SyncReport, SyncService};
