// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborators shared by the research nodes.

use std::sync::Arc;

use volera_agent::{AgentRuntime, ProgressChannel};
use volera_config::model::{CrawlerConfig, ResearchConfig};
use volera_core::types::CrawlOptions;
use volera_core::{Crawler, EventSink, SearchTool};

use crate::images::ImageTasks;

/// Everything a research node needs besides the conversation state.
#[derive(Clone)]
pub struct ResearchContext {
    pub runtime: AgentRuntime,
    pub search: Arc<dyn SearchTool>,
    pub crawler: Arc<dyn Crawler>,
    pub sink: Arc<dyn EventSink>,
    pub images: Arc<ImageTasks>,
    pub config: ResearchConfig,
    pub crawl_options: CrawlOptions,
}

impl ResearchContext {
    pub fn new(
        runtime: AgentRuntime,
        search: Arc<dyn SearchTool>,
        crawler: Arc<dyn Crawler>,
        sink: Arc<dyn EventSink>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            runtime,
            search,
            crawler,
            sink,
            images: Arc::new(ImageTasks::new()),
            config,
            crawl_options: CrawlOptions::default(),
        }
    }

    /// Takes the per-request crawl switches from the crawler settings.
    pub fn with_crawler_config(mut self, crawler: &CrawlerConfig) -> Self {
        self.crawl_options = CrawlOptions {
            bypass_cache: crawler.bypass_cache,
            excluded_tags: crawler.excluded_tags.clone(),
            exclude_external_links: crawler.exclude_external_links,
        };
        self
    }

    /// Progress channel of the conversation's client.
    pub fn progress(&self, ws_id: &str) -> ProgressChannel {
        ProgressChannel::new(self.sink.clone(), ws_id)
    }
}
