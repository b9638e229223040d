// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Search engine capability.

use async_trait::async_trait;

use crate::error::VoleraError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{SearchRequest, SearchResult};

#[async_trait]
pub trait SearchTool: PluginAdapter {
    /// Runs a web or image search, returning at most `request.num_results` hits.
    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchResult>, VoleraError>;
}
