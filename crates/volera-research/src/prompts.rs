// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System prompts and user-prompt builders for the research agents.

use volera_agent::Prompt;
use volera_core::{ProductRecord, SearchQuery};

use crate::schema::PlannerOutput;
use crate::state::ConversationState;

const PLANNER_SYSTEM: &str = "\
You are the planning agent of a shopping assistant. Decide whether the \
request is specific enough to research. If a key detail such as budget, \
use case or region is missing and cannot be inferred, set action to \
\"__user__\" and put one short question in content. Otherwise set action to \
\"__researcher__\" and write a plan: no_of_results (how many products to \
show, default 10), search_queries as {site, query, source} where query has \
the form \"<brand> <name> <region>\" and site is a retailer such as amazon, \
researcher_agent_instructions for the extractor, and filter_criteria the \
reviewer will apply. Never repeat a query listed as already searched.";

const EXTRACTOR_SYSTEM: &str = "\
You extract products from a retailer page rendered as markdown. Return every \
product on the page with at least name, current_price as a number and the \
product url. Leave fields you cannot find empty. Do not invent products.";

const REVIEWER_SYSTEM: &str = "\
You review products found by a research agent. Return status \"__passed__\" \
and the product_ids that satisfy the filter criteria, or \"__failed__\" when \
none do. Use only ids from the list you are given. Explain briefly in comment.";

const RESPONDER_SYSTEM: &str = "\
You are a shopping assistant presenting research results. Write a short \
markdown answer that recommends the listed products, cites prices and \
explains trade-offs. Refer to products by name.";

pub fn planner(state: &ConversationState) -> Prompt {
    let mut user = format!("User request: {}", state.ws_message.content.trim());
    if let Some(reply) = &state.human_response {
        user.push_str(&format!("\nUser reply: {}", reply.trim()));
    }
    if let Some(review) = &state.agent_results.reviewer
        && !review.comment.is_empty()
    {
        user.push_str(&format!("\nReviewer feedback on the last plan: {}", review.comment));
    }
    if !state.searched_queries.is_empty() {
        user.push_str("\nAlready searched:");
        for query in &state.searched_queries {
            user.push_str(&format!("\n- {} on {}", query.query, query.site));
        }
    }
    Prompt::new(PLANNER_SYSTEM, user)
}

pub fn extractor(query: &SearchQuery, url: &str, instructions: &str, chunk: &str) -> Prompt {
    let mut user = format!("Search: {} on {}\nPage: {url}\n", query.query, query.site);
    if !instructions.is_empty() {
        user.push_str(&format!("Instructions: {instructions}\n"));
    }
    user.push('\n');
    user.push_str(chunk);
    Prompt::new(EXTRACTOR_SYSTEM, user)
}

pub fn reviewer(plan: &PlannerOutput, products: &[ProductRecord]) -> Prompt {
    let mut user = format!(
        "Filter criteria: {}\nResearch instructions: {}\nProducts:",
        plan.filter_criteria, plan.researcher_agent_instructions
    );
    for product in products {
        user.push_str(&format!("\n{}", listing(product)));
    }
    Prompt::new(REVIEWER_SYSTEM, user)
}

pub fn responder(request: &str, products: &[ProductRecord]) -> Prompt {
    let mut user = format!("User request: {}\nProducts:", request.trim());
    for product in products {
        user.push_str(&format!("\n{}", listing(product)));
    }
    Prompt::new(RESPONDER_SYSTEM, user)
}

fn listing(product: &ProductRecord) -> String {
    let currency = product.currency.as_deref().unwrap_or("");
    let mut line = format!(
        "- id={} | {} | {}{:.2}",
        product.product_id, product.name, currency, product.current_price
    );
    if let Some(rating) = product.rating {
        line.push_str(&format!(" | rated {rating:.1}"));
    }
    if let Some(source) = &product.source {
        line.push_str(&format!(" | {source}"));
    }
    line
}
