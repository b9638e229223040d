// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Page fetching capability.

use async_trait::async_trait;

use crate::error::VoleraError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CrawlOptions, FetchResult};

/// Fetches pages and renders them to markdown.
///
/// `fetch` never fails for page-level problems; those come back as
/// `FetchResult { success: false, .. }`.
#[async_trait]
pub trait Crawler: PluginAdapter {
    async fn fetch(&self, url: &str, options: &CrawlOptions) -> FetchResult;

    /// Fetches a batch. Results keep the input order; one failure never
    /// cancels the others.
    async fn fetch_many(&self, urls: &[String], options: &CrawlOptions) -> Vec<FetchResult>;

    /// Checks that a URL answers with a successful status, without rendering it.
    async fn probe(&self, url: &str) -> Result<bool, VoleraError>;
}
