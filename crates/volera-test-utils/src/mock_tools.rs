// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted search and crawler adapters.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use volera_core::types::{
    AdapterType, CrawlOptions, FetchResult, HealthStatus, SearchKind, SearchRequest, SearchResult,
};
use volera_core::{Crawler, PluginAdapter, SearchTool, VoleraError};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A web search hit.
pub fn hit(title: &str, link: &str) -> SearchResult {
    SearchResult {
        title: title.to_string(),
        link: link.to_string(),
        snippet: format!("{title} snippet"),
        source: "mock".to_string(),
        ..SearchResult::default()
    }
}

/// An image search hit.
pub fn image_hit(title: &str, page: &str, image_url: &str) -> SearchResult {
    SearchResult {
        title: title.to_string(),
        link: page.to_string(),
        source: "mock".to_string(),
        image_url: Some(image_url.to_string()),
        thumbnail: Some(format!("{image_url}?thumb")),
        image_width: Some(640),
        image_height: Some(480),
        ..SearchResult::default()
    }
}

/// Search results keyed by a substring of the query.
#[derive(Default)]
pub struct MockSearch {
    web: Mutex<Vec<(String, Vec<SearchResult>)>>,
    images: Mutex<Vec<SearchResult>>,
    failing: Mutex<Vec<String>>,
    requests: Mutex<Vec<SearchRequest>>,
    health: Mutex<Option<HealthStatus>>,
    shut_down: AtomicBool,
}

impl MockSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Web searches whose query contains `pattern` return `results`.
    pub fn with_results(self, pattern: &str, results: Vec<SearchResult>) -> Self {
        lock(&self.web).push((pattern.to_string(), results));
        self
    }

    /// Every image search returns `results`.
    pub fn with_images(self, results: Vec<SearchResult>) -> Self {
        *lock(&self.images) = results;
        self
    }

    /// Searches whose query contains `pattern` fail.
    pub fn failing(self, pattern: &str) -> Self {
        lock(&self.failing).push(pattern.to_string());
        self
    }

    /// `health_check` reports `status` instead of healthy.
    pub fn with_health(self, status: HealthStatus) -> Self {
        *lock(&self.health) = Some(status);
        self
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        lock(&self.requests).clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for MockSearch {
    fn name(&self) -> &str {
        "mock-search"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Search
    }

    async fn health_check(&self) -> Result<HealthStatus, VoleraError> {
        Ok(lock(&self.health).clone().unwrap_or(HealthStatus::Healthy))
    }

    async fn shutdown(&self) -> Result<(), VoleraError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl SearchTool for MockSearch {
    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchResult>, VoleraError> {
        lock(&self.requests).push(request.clone());
        if lock(&self.failing).iter().any(|p| request.query.contains(p.as_str())) {
            return Err(VoleraError::Search {
                message: format!("scripted failure for {}", request.query),
            });
        }
        let mut results = match request.kind {
            SearchKind::Image => lock(&self.images).clone(),
            SearchKind::Web => lock(&self.web)
                .iter()
                .find(|(pattern, _)| request.query.contains(pattern.as_str()))
                .map(|(_, results)| results.clone())
                .unwrap_or_default(),
        };
        results.truncate(usize::from(request.num_results));
        Ok(results)
    }
}

/// Pages served from memory. Unknown URLs fail.
#[derive(Default)]
pub struct MockCrawler {
    pages: Mutex<HashMap<String, Result<String, String>>>,
    reachable: Mutex<HashSet<String>>,
    fetched: Mutex<Vec<String>>,
}

impl MockCrawler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, markdown: &str) -> Self {
        lock(&self.pages).insert(url.to_string(), Ok(markdown.to_string()));
        self
    }

    pub fn with_failure(self, url: &str, error: &str) -> Self {
        lock(&self.pages).insert(url.to_string(), Err(error.to_string()));
        self
    }

    /// `probe` answers true for this URL.
    pub fn with_reachable(self, url: &str) -> Self {
        lock(&self.reachable).insert(url.to_string());
        self
    }

    /// URLs passed to `fetch`, in call order.
    pub fn fetched(&self) -> Vec<String> {
        lock(&self.fetched).clone()
    }
}

#[async_trait]
impl PluginAdapter for MockCrawler {
    fn name(&self) -> &str {
        "mock-crawler"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Crawler
    }

    async fn health_check(&self) -> Result<HealthStatus, VoleraError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VoleraError> {
        Ok(())
    }
}

#[async_trait]
impl Crawler for MockCrawler {
    async fn fetch(&self, url: &str, _options: &CrawlOptions) -> FetchResult {
        lock(&self.fetched).push(url.to_string());
        match lock(&self.pages).get(url) {
            Some(Ok(markdown)) => FetchResult {
                url: url.to_string(),
                success: true,
                markdown: markdown.clone(),
                error: None,
            },
            Some(Err(error)) => FetchResult::failed(url, error.clone()),
            None => FetchResult::failed(url, "no such page"),
        }
    }

    async fn fetch_many(&self, urls: &[String], options: &CrawlOptions) -> Vec<FetchResult> {
        futures::future::join_all(urls.iter().map(|url| self.fetch(url, options))).await
    }

    async fn probe(&self, url: &str) -> Result<bool, VoleraError> {
        Ok(lock(&self.reachable).contains(url))
    }
}
