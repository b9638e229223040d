// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable remote document store.

use async_trait::async_trait;

use crate::error::VoleraError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Document, StoreQuery};

/// Async CRUD over typed collections.
#[async_trait]
pub trait DurableStore: PluginAdapter {
    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: serde_json::Value,
    ) -> Result<Document, VoleraError>;

    async fn list_documents(
        &self,
        collection: &str,
        queries: &[StoreQuery],
    ) -> Result<Vec<Document>, VoleraError>;

    /// Returns `Ok(None)` when the document does not exist.
    async fn get_document(&self, collection: &str, id: &str)
    -> Result<Option<Document>, VoleraError>;

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: serde_json::Value,
    ) -> Result<Document, VoleraError>;

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), VoleraError>;
}
