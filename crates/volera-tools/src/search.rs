// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serper-compatible web and image search client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, info};
use volera_cache::Memoizer;
use volera_config::model::SearchConfig;
use volera_core::types::{AdapterType, HealthStatus, SearchKind, SearchRequest, SearchResult};
use volera_core::{PluginAdapter, SearchTool, VoleraError};

/// Search API client.
#[derive(Debug, Clone)]
pub struct SerperSearch {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OrganicHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    image_width: Option<u32>,
    #[serde(default)]
    image_height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<OrganicHit>,
    #[serde(default)]
    images: Vec<ImageHit>,
}

impl SerperSearch {
    /// Builds a client. The API key comes from config (or `SERPER_API_KEY`,
    /// which the config loader maps onto `search.api_key`).
    pub fn new(config: &SearchConfig) -> Result<Self, VoleraError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                VoleraError::Config(
                    "search API key not found. Set search.api_key or SERPER_API_KEY.".into(),
                )
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&api_key)
                .map_err(|e| VoleraError::Config(format!("invalid search API key header: {e}")))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VoleraError::Search {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        info!(base_url = %config.base_url, "search client initialized");
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, kind: SearchKind) -> String {
        match kind {
            SearchKind::Web => format!("{}/search", self.base_url),
            SearchKind::Image => format!("{}/images", self.base_url),
        }
    }
}

fn query_text(request: &SearchRequest) -> String {
    match &request.site {
        Some(site) if !site.is_empty() => format!("{} site:{site}", request.query),
        _ => request.query.clone(),
    }
}

#[async_trait]
impl PluginAdapter for SerperSearch {
    fn name(&self) -> &str {
        "serper"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Search
    }

    async fn health_check(&self) -> Result<HealthStatus, VoleraError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VoleraError> {
        Ok(())
    }
}

#[async_trait]
impl SearchTool for SerperSearch {
    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchResult>, VoleraError> {
        let num = request.num_results.clamp(1, 10);
        let body = serde_json::json!({ "q": query_text(&request), "num": num });

        let response = self
            .client
            .post(self.endpoint(request.kind))
            .json(&body)
            .send()
            .await
            .map_err(|e| VoleraError::Search {
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(VoleraError::Search {
                message: format!("API returned {status}: {text}"),
            });
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| VoleraError::Search {
            message: format!("failed to parse response: {e}"),
        })?;

        let results: Vec<SearchResult> = match request.kind {
            SearchKind::Web => parsed
                .organic
                .into_iter()
                .filter(|hit| !hit.link.is_empty())
                .map(|hit| SearchResult {
                    source: hit.source.unwrap_or_else(|| host_of(&hit.link)),
                    title: hit.title,
                    link: hit.link,
                    snippet: hit.snippet,
                    ..SearchResult::default()
                })
                .collect(),
            SearchKind::Image => parsed
                .images
                .into_iter()
                .filter(|hit| hit.image_url.is_some())
                .map(|hit| SearchResult {
                    source: hit.source.unwrap_or_else(|| host_of(&hit.link)),
                    title: hit.title,
                    link: hit.link,
                    snippet: String::new(),
                    thumbnail: hit.thumbnail_url,
                    image_url: hit.image_url,
                    image_height: hit.image_height,
                    image_width: hit.image_width,
                })
                .collect(),
        };

        debug!(query = %request.query, kind = ?request.kind, hits = results.len(), "search complete");
        Ok(results.into_iter().take(usize::from(num)).collect())
    }
}

fn host_of(link: &str) -> String {
    reqwest::Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// A [`SearchTool`] whose results are memoized by query similarity.
pub struct CachedSearch {
    inner: Arc<dyn SearchTool>,
    memo: Arc<Memoizer>,
}

impl CachedSearch {
    pub fn new(inner: Arc<dyn SearchTool>, memo: Arc<Memoizer>) -> Self {
        Self { inner, memo }
    }
}

#[async_trait]
impl PluginAdapter for CachedSearch {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Search
    }

    async fn health_check(&self) -> Result<HealthStatus, VoleraError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), VoleraError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl SearchTool for CachedSearch {
    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchResult>, VoleraError> {
        let rest = (request.num_results, request.kind, request.site.clone());
        let inner = Arc::clone(&self.inner);
        let query = request.query.clone();
        self.memo
            .memoize_similar("search", &query, &rest, None, move || async move {
                inner.search(request).await
            })
            .await
    }
}
