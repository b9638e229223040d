// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use volera_agent::ProgressChannel;
use volera_core::events::{Source, SourceMetadata};
use volera_core::types::{Charge, SearchRequest};
use volera_core::{ProductRecord, SearchQuery, VoleraError};
use volera_graph::{Command, Node, RunConfig};
use volera_tools::{chunk_rerank, rerank, shorten};

use crate::context::ResearchContext;
use crate::prompts;
use crate::schema::{ExtractionOutput, PlannerOutput, ResearchSummary};
use crate::state::{merge_products, AgentResult, ConversationState, NodeFailure, StateUpdate, RECOVERY, RESEARCHER, REVIEWER};

/// Runs every plan query not searched yet in this conversation: search,
/// fetch, extract, rerank.
///
/// A failed search, fetch or extraction skips that unit with a progress
/// comment. Running out of credits aborts the node.
pub struct ResearcherNode {
    ctx: Arc<ResearchContext>,
}

/// What one plan query produced.
#[derive(Default)]
struct QueryOutcome {
    products: Vec<ProductRecord>,
    sources: Vec<Source>,
    pages_fetched: usize,
    pages_skipped: usize,
}

impl ResearcherNode {
    pub fn new(ctx: Arc<ResearchContext>) -> Self {
        Self { ctx }
    }

    async fn research_query(
        &self,
        state: &ConversationState,
        plan: &PlannerOutput,
        query: &SearchQuery,
        progress: &ProgressChannel,
    ) -> Result<QueryOutcome, VoleraError> {
        let mut outcome = QueryOutcome::default();
        progress.searching(&query.query).await;

        let mut request = SearchRequest::web(
            format!("{} {}", query.query, query.site),
            self.ctx.config.results_per_query,
        );
        request.site = Some(query.site.clone());
        let hits = match self.ctx.search.search(request).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(query = query.query.as_str(), site = query.site.as_str(), error = %e, "search failed, skipping query");
                progress.comment(format!("Search for \"{}\" failed, skipping it", query.query)).await;
                return Ok(outcome);
            }
        };

        let mut urls: Vec<String> = Vec::with_capacity(hits.len());
        for hit in &hits {
            if !hit.link.is_empty() && !urls.contains(&hit.link) {
                progress.scraping(&hit.link).await;
                urls.push(hit.link.clone());
            }
        }
        if urls.is_empty() {
            progress.comment(format!("No results for \"{}\"", query.query)).await;
            return Ok(outcome);
        }

        let pages = self.ctx.crawler.fetch_many(&urls, &self.ctx.crawl_options).await;
        let mut chunks: Vec<(usize, String)> = Vec::new();
        let mut page_urls: Vec<String> = Vec::new();
        for page in pages {
            if !page.success || page.markdown.trim().is_empty() {
                let reason = page.error.as_deref().unwrap_or("empty page");
                debug!(url = page.url.as_str(), reason, "fetch skipped");
                progress.comment(format!("Skipped {}: {reason}", page.url)).await;
                outcome.pages_skipped += 1;
                continue;
            }
            outcome.pages_fetched += 1;
            if let Some(hit) = hits.iter().find(|h| h.link == page.url) {
                outcome.sources.push(Source {
                    page_content: hit.snippet.clone(),
                    metadata: SourceMetadata {
                        url: hit.link.clone(),
                        title: hit.title.clone(),
                    },
                });
            }
            let index = page_urls.len();
            for chunk in split_page(&query.query, &page.markdown, self.ctx.config.word_threshold) {
                chunks.push((index, chunk));
            }
            page_urls.push(page.url);
        }

        let permits = Semaphore::new(self.ctx.config.extraction_concurrency.max(1));
        let extractions = chunks.iter().map(|(index, chunk)| {
            let permits = &permits;
            let url = &page_urls[*index];
            async move {
                let _permit = permits
                    .acquire()
                    .await
                    .map_err(|e| VoleraError::Internal(format!("extraction semaphore closed: {e}")))?;
                let out = self
                    .ctx
                    .runtime
                    .call_structured::<ExtractionOutput>(
                        &state.user_id,
                        "products",
                        &prompts::extractor(query, url, &plan.researcher_agent_instructions, chunk),
                        Charge::Text,
                        &state.model,
                        None,
                        &[],
                    )
                    .await?;
                Ok::<_, VoleraError>(out.value.unwrap_or_default().products)
            }
        });
        let results = join_all(extractions).await;

        let mut found_per_page = vec![0usize; page_urls.len()];
        let mut failed_pages = vec![false; page_urls.len()];
        let mut products = Vec::new();
        for ((index, _), result) in chunks.iter().zip(results) {
            match result {
                Ok(records) => {
                    for mut product in records.into_iter().filter(ProductRecord::is_complete) {
                        product.product_id = shorten(&product.url);
                        if product.source.as_deref().is_none_or(str::is_empty) {
                            product.source = Some(query.source.clone());
                        }
                        found_per_page[*index] += 1;
                        products.push(product);
                    }
                }
                Err(e @ (VoleraError::InsufficientCredits { .. } | VoleraError::DailyLimitExceeded { .. })) => {
                    return Err(e);
                }
                Err(e) => {
                    warn!(url = page_urls[*index].as_str(), error = %e, "extraction failed, skipping chunk");
                    failed_pages[*index] = true;
                }
            }
        }
        for (index, url) in page_urls.iter().enumerate() {
            if failed_pages[index] && found_per_page[index] == 0 {
                progress.comment(format!("Could not read products from {url}")).await;
            } else {
                progress.comment(format!("Found {} products on {url}", found_per_page[index])).await;
            }
        }

        outcome.products = rerank(&query.query, products);
        Ok(outcome)
    }
}

/// Splits a long page into two windows ordered by relevance to `query`.
/// Pages up to `threshold` words are kept whole.
pub(crate) fn split_page(query: &str, markdown: &str, threshold: usize) -> Vec<String> {
    let words = markdown.split_whitespace().count();
    if words <= threshold {
        return vec![markdown.to_string()];
    }
    chunk_rerank(query, markdown, words.div_ceil(2))
}

#[async_trait]
impl Node<ConversationState> for ResearcherNode {
    async fn run(
        &self,
        state: &ConversationState,
        _config: &RunConfig,
    ) -> Result<Command<StateUpdate>, VoleraError> {
        let plan = state.agent_results.planner.clone().unwrap_or_default();
        let pending: Vec<SearchQuery> = plan
            .normalized_queries()
            .into_iter()
            .filter(|q| !state.has_searched(q))
            .collect();
        if pending.is_empty() {
            info!(ws_id = state.ws_id.as_str(), "no unsearched queries in plan");
            return Err(VoleraError::NoResults {
                query: state.ws_message.content.clone(),
            });
        }

        let progress = self.ctx.progress(&state.ws_id);
        let mut update = StateUpdate::default();
        if state.task_id.is_none() {
            update.task_id = Some(self.ctx.images.spawn(
                self.ctx.search.clone(),
                self.ctx.crawler.clone(),
                pending[0].query.clone(),
                self.ctx.config.image_results,
                self.ctx.config.image_concurrency,
            ));
        }

        let mut summary = ResearchSummary::default();
        let mut round: Vec<ProductRecord> = Vec::new();
        let mut sources = Vec::new();
        for query in &pending {
            let outcome = self.research_query(state, &plan, query, &progress).await?;
            summary.queries_run += 1;
            summary.pages_fetched += outcome.pages_fetched;
            summary.pages_skipped += outcome.pages_skipped;
            merge_products(&mut round, outcome.products);
            sources.extend(outcome.sources);
        }
        summary.products_found = round.len();
        info!(
            ws_id = state.ws_id.as_str(),
            queries = summary.queries_run,
            fetched = summary.pages_fetched,
            skipped = summary.pages_skipped,
            products = summary.products_found,
            "research round finished"
        );

        update.searched = summary.queries_run as u32;
        update.scraped = summary.pages_fetched as u32;
        update.searched_queries = pending;
        update.sources = sources;
        update.agent_result = Some(AgentResult::Researcher(summary));

        if round.is_empty() {
            progress.comment("No products found for this plan").await;
            let error = VoleraError::NoResults {
                query: state.ws_message.content.clone(),
            };
            update.failure = Some(NodeFailure::new(RESEARCHER, &error));
            return Ok(Command::goto(RECOVERY, update));
        }

        update.current_products = Some(round);
        Ok(Command::goto(REVIEWER, update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_pages_stay_whole() {
        let chunks = split_page("laptop", "a small laptop page", 1000);
        assert_eq!(chunks, vec!["a small laptop page".to_string()]);
    }

    #[test]
    fn long_pages_split_in_two_with_relevant_half_first() {
        let first = vec!["kettle"; 6].join(" ");
        let second = vec!["laptop"; 6].join(" ");
        let page = format!("{first} {second}");
        let chunks = split_page("laptop", &page, 10);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("laptop"));
    }
}
