// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP crawler that renders pages to markdown-ish text.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use volera_cache::Memoizer;
use volera_config::model::CrawlerConfig;
use volera_core::types::{AdapterType, CrawlOptions, FetchResult, HealthStatus};
use volera_core::{Crawler, PluginAdapter, VoleraError};

/// Column width handed to the HTML renderer.
const RENDER_WIDTH: usize = 120;

/// Fetches pages over HTTP and converts them with `html2text`.
///
/// Successful renders are memoized per URL unless the request sets
/// `bypass_cache`.
pub struct HttpCrawler {
    client: reqwest::Client,
    concurrency: usize,
    memo: Option<Arc<Memoizer>>,
}

impl HttpCrawler {
    pub fn new(config: &CrawlerConfig, concurrency: usize) -> Result<Self, VoleraError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone());
        if let Some(proxy) = &config.proxy_url {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| VoleraError::Config(format!("invalid crawler.proxy_url: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|e| VoleraError::Crawl {
            url: String::new(),
            message: format!("failed to build HTTP client: {e}"),
        })?;

        info!(concurrency, proxied = config.proxy_url.is_some(), "crawler initialized");
        Ok(Self {
            client,
            concurrency: concurrency.max(1),
            memo: None,
        })
    }

    pub fn with_memo(mut self, memo: Arc<Memoizer>) -> Self {
        self.memo = Some(memo);
        self
    }

    async fn fetch_uncached(&self, url: &str, options: &CrawlOptions) -> Result<String, VoleraError> {
        let crawl_err = |message: String| VoleraError::Crawl {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| crawl_err(format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(crawl_err(format!("HTTP {status}")));
        }
        let html = response
            .text()
            .await
            .map_err(|e| crawl_err(format!("failed to read body: {e}")))?;

        let cleaned = clean_html(&html, url, options);
        let markdown = html2text::from_read(cleaned.as_bytes(), RENDER_WIDTH)
            .map_err(|e| crawl_err(format!("render failed: {e}")))?;
        if markdown.trim().is_empty() {
            return Err(crawl_err("page rendered empty".into()));
        }
        Ok(markdown)
    }
}

/// Removes excluded tags and, when asked, links to other hosts.
pub fn clean_html(html: &str, page_url: &str, options: &CrawlOptions) -> String {
    let mut out = html.to_string();
    for tag in &options.excluded_tags {
        let tag = regex::escape(tag);
        if let Ok(paired) = Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")) {
            out = paired.replace_all(&out, "").into_owned();
        }
        if let Ok(lone) = Regex::new(&format!(r"(?is)<{tag}\b[^>]*/?>")) {
            out = lone.replace_all(&out, "").into_owned();
        }
    }

    if options.exclude_external_links {
        let page_host = reqwest::Url::parse(page_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        if let (Some(page_host), Ok(anchor)) = (
            page_host,
            Regex::new(r#"(?is)<a\b[^>]*?href\s*=\s*["']https?://([^/"':?#]+)[^"']*["'][^>]*>"#),
        ) {
            out = anchor
                .replace_all(&out, |caps: &regex::Captures<'_>| {
                    if caps[1].eq_ignore_ascii_case(&page_host) {
                        caps[0].to_string()
                    } else {
                        "<a>".to_string()
                    }
                })
                .into_owned();
        }
    }
    out
}

#[async_trait]
impl PluginAdapter for HttpCrawler {
    fn name(&self) -> &str {
        "http-crawler"
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
impl Crawler for HttpCrawler {
    async fn fetch(&self, url: &str, options: &CrawlOptions) -> FetchResult {
        let rendered = match (&self.memo, options.bypass_cache) {
            (Some(memo), false) => {
                memo.memoize("fetch", &(url, &options.excluded_tags, options.exclude_external_links), None, || {
                    self.fetch_uncached(url, options)
                })
                .await
            }
            _ => self.fetch_uncached(url, options).await,
        };

        match rendered {
            Ok(markdown) => {
                debug!(url, words = markdown.split_whitespace().count(), "page fetched");
                FetchResult {
                    url: url.to_string(),
                    success: true,
                    markdown,
                    error: None,
                }
            }
            Err(e) => {
                warn!(url, error = %e, "fetch failed");
                FetchResult::failed(url, e.to_string())
            }
        }
    }

    async fn fetch_many(&self, urls: &[String], options: &CrawlOptions) -> Vec<FetchResult> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let tasks = urls.iter().map(|url| {
            let permits = Arc::clone(&permits);
            async move {
                let Ok(_permit) = permits.acquire().await else {
                    return FetchResult::failed(url.as_str(), "crawler shut down");
                };
                self.fetch(url, options).await
            }
        });
        join_all(tasks).await
    }

    async fn probe(&self, url: &str) -> Result<bool, VoleraError> {
        let head = self.client.head(url).send().await;
        let response = match head {
            Ok(r) if r.status() != reqwest::StatusCode::METHOD_NOT_ALLOWED => r,
            _ => self.client.get(url).send().await.map_err(|e| VoleraError::Crawl {
                url: url.to_string(),
                message: format!("probe failed: {e}"),
            })?,
        };
        Ok(response.status().is_success())
    }
}
