// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background image search for the `image_search` event.
//!
//! The researcher starts the search when a run begins; the responder collects
//! it. Handles live in [`ImageTasks`] because a join handle cannot be
//! checkpointed with the state, which only stores the task id.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use volera_core::events::ImageResult;
use volera_core::types::SearchRequest;
use volera_core::{Crawler, SearchTool};

/// Registry of in-flight image searches keyed by task id.
#[derive(Default)]
pub struct ImageTasks {
    tasks: DashMap<String, JoinHandle<Vec<ImageResult>>>,
}

impl ImageTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts validating images for `query` and returns the task id.
    pub fn spawn(
        &self,
        search: Arc<dyn SearchTool>,
        crawler: Arc<dyn Crawler>,
        query: String,
        results: u8,
        concurrency: usize,
    ) -> String {
        let task_id = uuid::Uuid::new_v4().to_string();
        let handle = tokio::spawn(async move {
            validate_images(search.as_ref(), crawler.as_ref(), &query, results, concurrency).await
        });
        self.tasks.insert(task_id.clone(), handle);
        task_id
    }

    /// Waits up to `wait` for the task's images. A missing, failed or slow
    /// task yields no images.
    pub async fn take(&self, task_id: &str, wait: Duration) -> Vec<ImageResult> {
        let Some((_, mut handle)) = self.tasks.remove(task_id) else {
            debug!(task_id, "no image task");
            return Vec::new();
        };
        match tokio::time::timeout(wait, &mut handle).await {
            Ok(Ok(images)) => images,
            Ok(Err(e)) => {
                warn!(task_id, error = %e, "image task failed");
                Vec::new()
            }
            Err(_) => {
                warn!(task_id, "image task timed out");
                handle.abort();
                Vec::new()
            }
        }
    }

    /// Cancels the task if it is still registered.
    pub fn abort(&self, task_id: &str) -> bool {
        match self.tasks.remove(task_id) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Runs an image search and keeps the hits whose image URL answers.
///
/// Probes run at most `concurrency` at a time; a failed probe drops the hit.
pub async fn validate_images(
    search: &dyn SearchTool,
    crawler: &dyn Crawler,
    query: &str,
    results: u8,
    concurrency: usize,
) -> Vec<ImageResult> {
    let hits = match search.search(SearchRequest::images(query, results)).await {
        Ok(hits) => hits,
        Err(e) => {
            warn!(query, error = %e, "image search failed");
            return Vec::new();
        }
    };

    let permits = Semaphore::new(concurrency.max(1));
    let checks = hits.into_iter().filter_map(|hit| {
        let img_url = hit.image_url.clone().filter(|u| !u.is_empty())?;
        let permits = &permits;
        Some(async move {
            let _permit = permits.acquire().await.ok()?;
            match crawler.probe(&img_url).await {
                Ok(true) => Some(ImageResult {
                    url: hit.link,
                    img_url,
                    title: hit.title,
                }),
                Ok(false) => None,
                Err(e) => {
                    debug!(url = img_url.as_str(), error = %e, "image probe failed");
                    None
                }
            }
        })
    });
    join_all(checks).await.into_iter().flatten().collect()
}
