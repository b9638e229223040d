// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured outputs of the research agents.
//!
//! Each type doubles as the JSON schema the model is asked to answer with.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use volera_core::{ProductRecord, SearchQuery};

/// What the planner decided to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum PlannerAction {
    /// Ask the user a clarifying question.
    #[serde(rename = "__user__")]
    AskUser,
    /// Run the search plan.
    #[default]
    #[serde(rename = "__researcher__")]
    Research,
}

/// The planner's answer: a clarifying question or a search plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlannerOutput {
    #[serde(default)]
    pub action: PlannerAction,
    /// Question for the user when `action` is `__user__`.
    #[serde(default)]
    pub content: String,
    /// Products the user wants to see.
    #[serde(default)]
    pub no_of_results: u32,
    #[serde(default)]
    pub search_queries: Vec<SearchQuery>,
    #[serde(default)]
    pub researcher_agent_instructions: String,
    #[serde(default)]
    pub filter_criteria: String,
}

impl PlannerOutput {
    /// Queries with collapsed whitespace, empty entries dropped, and repeats
    /// of an earlier `(site, query)` pair removed.
    pub fn normalized_queries(&self) -> Vec<SearchQuery> {
        let mut seen = std::collections::HashSet::new();
        self.search_queries
            .iter()
            .filter_map(|q| {
                let query = collapse_whitespace(&q.query);
                let site = q.site.trim().to_lowercase();
                if query.is_empty() {
                    return None;
                }
                let normalized = SearchQuery {
                    source: if q.source.trim().is_empty() {
                        site.clone()
                    } else {
                        q.source.trim().to_string()
                    },
                    site,
                    query,
                };
                seen.insert(normalized.key()).then_some(normalized)
            })
            .collect()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Products the extractor found in one page chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionOutput {
    #[serde(default)]
    pub products: Vec<ProductRecord>,
}

/// The reviewer's verdict on the current round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ReviewStatus {
    #[serde(rename = "__passed__")]
    Passed,
    #[default]
    #[serde(rename = "__failed__")]
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewOutput {
    pub status: ReviewStatus,
    /// Ids of the products that satisfy the filter criteria.
    #[serde(default)]
    pub product_ids: Vec<String>,
    #[serde(default)]
    pub comment: String,
}

/// What the researcher did in its last visit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchSummary {
    pub queries_run: usize,
    pub pages_fetched: usize,
    pub pages_skipped: usize,
    pub products_found: usize,
}

/// The final answer sent to the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponderOutput {
    pub message_id: String,
    pub content: String,
    pub product_ids: Vec<String>,
}
