// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation state passed between research nodes.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;
use volera_core::events::Source;
use volera_core::types::{ModelMessage, WsMessage};
use volera_core::{ProductRecord, SearchQuery, VoleraError};
use volera_graph::{GraphState, INPUT};

use crate::schema::{PlannerOutput, ResearchSummary, ResponderOutput, ReviewOutput};

pub const PLANNER: &str = "planner";
pub const RESEARCHER: &str = "researcher";
pub const REVIEWER: &str = "reviewer";
pub const RESPONDER: &str = "responder";
pub const RECOVERY: &str = "recovery";

/// Latest structured output of each agent. Only the owning node writes its
/// slot; see [`AgentResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResults {
    #[serde(default)]
    pub planner: Option<PlannerOutput>,
    #[serde(default)]
    pub researcher: Option<ResearchSummary>,
    #[serde(default)]
    pub reviewer: Option<ReviewOutput>,
    #[serde(default)]
    pub responder: Option<ResponderOutput>,
}

/// One agent's output, tagged with its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentResult {
    Planner(PlannerOutput),
    Researcher(ResearchSummary),
    Reviewer(ReviewOutput),
    Responder(ResponderOutput),
}

impl AgentResult {
    pub fn owner(&self) -> &'static str {
        match self {
            Self::Planner(_) => PLANNER,
            Self::Researcher(_) => RESEARCHER,
            Self::Reviewer(_) => REVIEWER,
            Self::Responder(_) => RESPONDER,
        }
    }
}

/// Class of a recorded node failure, used by the recovery node to choose a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InsufficientCredits,
    DailyLimit,
    Timeout,
    NoResults,
    Validation,
    Fatal,
}

impl FailureKind {
    pub fn of(error: &VoleraError) -> Self {
        match error {
            VoleraError::InsufficientCredits { .. } => Self::InsufficientCredits,
            VoleraError::DailyLimitExceeded { .. } => Self::DailyLimit,
            VoleraError::Timeout { .. } => Self::Timeout,
            VoleraError::NoResults { .. } => Self::NoResults,
            VoleraError::Validation { .. } => Self::Validation,
            _ => Self::Fatal,
        }
    }
}

/// A node failure waiting for the recovery node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFailure {
    pub node: String,
    pub kind: FailureKind,
    pub message: String,
    /// Text shown to the user if the run cannot recover.
    pub notice: String,
    /// Key of the `error` event carrying `notice`.
    pub key: String,
}

impl NodeFailure {
    pub fn new(node: &str, error: &VoleraError) -> Self {
        let (notice, key) = crate::nodes::user_facing(error);
        Self {
            node: node.to_string(),
            kind: FailureKind::of(error),
            message: error.to_string(),
            notice,
            key: key.to_string(),
        }
    }
}

/// Shared state of one conversation.
///
/// Conversation-wide fields (`message_history`, `searched_queries`,
/// `all_products`) persist across turns. Run fields (`current_products`,
/// `reviewed_products_ids`, `current_depth`, `agent_results`) reset when the
/// user sends a new query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub user_id: String,
    pub ws_id: String,
    pub chat_id: String,
    pub model: String,
    #[serde(default)]
    pub ws_message: WsMessage,
    #[serde(default)]
    pub message_history: Vec<ModelMessage>,
    #[serde(default)]
    pub agent_results: AgentResults,
    #[serde(default)]
    pub previous_node: Option<String>,
    #[serde(default)]
    pub next_node: Option<String>,
    #[serde(default)]
    pub human_response: Option<String>,
    #[serde(default)]
    pub current_depth: u32,
    #[serde(default)]
    pub max_depth: u32,
    #[serde(default)]
    pub task_id: Option<String>,
    /// Identifies the current research run; keys the research charge.
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub searched_queries: Vec<SearchQuery>,
    #[serde(default)]
    pub current_products: Vec<ProductRecord>,
    #[serde(default)]
    pub all_products: Vec<ProductRecord>,
    #[serde(default)]
    pub reviewed_products_ids: Vec<String>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub total_searched: u32,
    #[serde(default)]
    pub total_scraped: u32,
    #[serde(default)]
    pub last_error: Option<NodeFailure>,
    /// Last text shown to the user, recorded in the session log.
    #[serde(default)]
    pub reply: Option<String>,
}

impl ConversationState {
    pub fn has_searched(&self, query: &SearchQuery) -> bool {
        self.searched_queries.iter().any(|q| q.key() == query.key())
    }

    /// Products accepted by the reviewer in this run, best first.
    pub fn reviewed_products(&self) -> Vec<ProductRecord> {
        let ids: HashSet<&str> = self.reviewed_products_ids.iter().map(String::as_str).collect();
        let mut products: Vec<ProductRecord> = self
            .all_products
            .iter()
            .filter(|p| ids.contains(p.product_id.as_str()))
            .cloned()
            .collect();
        sort_by_relevance(&mut products);
        products
    }
}

/// Stable sort by descending relevance.
pub fn sort_by_relevance(products: &mut [ProductRecord]) {
    products.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
}

/// Adds `incoming` to `products`, keeping one record per product id. When an
/// id repeats, the record with the higher relevance score wins.
pub fn merge_products(products: &mut Vec<ProductRecord>, incoming: Vec<ProductRecord>) {
    for product in incoming {
        match products.iter_mut().find(|p| p.product_id == product.product_id) {
            Some(existing) => {
                if product.relevance_score > existing.relevance_score {
                    *existing = product;
                }
            }
            None => products.push(product),
        }
    }
}

/// Identity of a conversation, supplied with its first message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionInfo {
    pub user_id: String,
    pub ws_id: String,
    pub chat_id: String,
    pub model: String,
    pub max_depth: u32,
}

/// Partial state written by a node or by caller input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub session: Option<SessionInfo>,
    /// A new user query; starts a new run.
    pub ws_message: Option<WsMessage>,
    pub human_response: Option<String>,
    /// Clears `human_response` after the node read it.
    pub consume_human_response: bool,
    pub new_messages: Vec<ModelMessage>,
    pub agent_result: Option<AgentResult>,
    pub next_node: Option<String>,
    pub current_depth: Option<u32>,
    pub searched_queries: Vec<SearchQuery>,
    /// Replaces `current_products` and is merged into `all_products`.
    pub current_products: Option<Vec<ProductRecord>>,
    pub reviewed_ids: Vec<String>,
    pub sources: Vec<Source>,
    pub searched: u32,
    pub scraped: u32,
    pub task_id: Option<String>,
    pub clear_task: bool,
    pub failure: Option<NodeFailure>,
    pub clear_failure: bool,
    /// The run's research charge is settled. Research after this point
    /// belongs to a new run and is charged again.
    pub close_run: bool,
    pub reply: Option<String>,
}

impl StateUpdate {
    /// Input for a new user query.
    pub fn user_message(session: SessionInfo, message: WsMessage) -> Self {
        Self {
            session: Some(session),
            ws_message: Some(message),
            ..Self::default()
        }
    }

    /// Input for a reply to a question the graph suspended on.
    pub fn human_reply(session: SessionInfo, content: impl Into<String>) -> Self {
        Self {
            session: Some(session),
            human_response: Some(content.into()),
            ..Self::default()
        }
    }
}

impl GraphState for ConversationState {
    type Update = StateUpdate;

    fn apply(&mut self, node: &str, update: StateUpdate) {
        self.previous_node = Some(node.to_string());

        if let Some(session) = update.session {
            if !session.user_id.is_empty() {
                self.user_id = session.user_id;
            }
            self.ws_id = session.ws_id;
            if !session.chat_id.is_empty() {
                self.chat_id = session.chat_id;
            }
            if !session.model.is_empty() {
                self.model = session.model;
            }
            self.max_depth = session.max_depth;
        }

        if let Some(message) = update.ws_message {
            self.ws_message = message;
            self.run_id = uuid::Uuid::new_v4().to_string();
            self.agent_results = AgentResults::default();
            self.current_products.clear();
            self.reviewed_products_ids.clear();
            self.sources.clear();
            self.total_searched = 0;
            self.total_scraped = 0;
            self.next_node = None;
            self.human_response = None;
            self.last_error = None;
        }
        if update.close_run {
            self.run_id = uuid::Uuid::new_v4().to_string();
        }
        if node == INPUT {
            self.current_depth = 0;
            self.reply = None;
        }

        if update.consume_human_response {
            self.human_response = None;
        }
        if let Some(response) = update.human_response {
            self.human_response = Some(response);
        }

        self.message_history.extend(update.new_messages);

        if let Some(result) = update.agent_result {
            if result.owner() != node {
                warn!(node, owner = result.owner(), "agent result written by foreign node, dropped");
            } else {
                match result {
                    AgentResult::Planner(out) => self.agent_results.planner = Some(out),
                    AgentResult::Researcher(out) => self.agent_results.researcher = Some(out),
                    AgentResult::Reviewer(out) => self.agent_results.reviewer = Some(out),
                    AgentResult::Responder(out) => self.agent_results.responder = Some(out),
                }
            }
        }

        if let Some(next) = update.next_node {
            self.next_node = Some(next);
        }
        if let Some(depth) = update.current_depth {
            self.current_depth = depth.min(self.max_depth);
        }

        for query in update.searched_queries {
            if !self.has_searched(&query) {
                self.searched_queries.push(query);
            }
        }

        if let Some(products) = update.current_products {
            merge_products(&mut self.all_products, products.clone());
            self.current_products = products;
        }

        let known: HashSet<String> = self.all_products.iter().map(|p| p.product_id.clone()).collect();
        for id in update.reviewed_ids {
            if !known.contains(&id) {
                warn!(node, product_id = id.as_str(), "reviewed id not among found products, dropped");
                continue;
            }
            if !self.reviewed_products_ids.contains(&id) {
                self.reviewed_products_ids.push(id);
            }
        }

        for source in update.sources {
            if !self.sources.iter().any(|s| s.metadata.url == source.metadata.url) {
                self.sources.push(source);
            }
        }
        self.total_searched += update.searched;
        self.total_scraped += update.scraped;

        if update.clear_task {
            self.task_id = None;
        }
        if let Some(task_id) = update.task_id {
            self.task_id = Some(task_id);
        }

        if update.clear_failure {
            self.last_error = None;
        }
        if let Some(failure) = update.failure {
            self.last_error = Some(failure);
        }
        if let Some(reply) = update.reply {
            self.reply = Some(reply);
        }
    }

    fn resume_node(&self) -> Option<String> {
        self.next_node.clone()
    }

    fn record_error(&mut self, node: &str, error: &VoleraError) {
        self.last_error = Some(NodeFailure::new(node, error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, score: f64) -> ProductRecord {
        let mut p: ProductRecord = serde_json::from_value(serde_json::json!({
            "name": format!("Product {id}"),
            "current_price": 500.0,
            "url": format!("https://shop.example/{id}"),
        }))
        .unwrap();
        p.product_id = id.to_string();
        p.relevance_score = score;
        p
    }

    fn session() -> SessionInfo {
        SessionInfo {
            user_id: "u1".into(),
            ws_id: "ws1".into(),
            chat_id: "c1".into(),
            model: "m".into(),
            max_depth: 3,
        }
    }

    #[test]
    fn merge_keeps_higher_score() {
        let mut all = vec![product("a", 0.2), product("b", 0.5)];
        merge_products(&mut all, vec![product("a", 0.9), product("b", 0.1), product("c", 0.3)]);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].relevance_score, 0.9);
        assert_eq!(all[1].relevance_score, 0.5);
    }

    #[test]
    fn agent_results_are_owner_only() {
        let mut state = ConversationState::default();
        state.apply(
            REVIEWER,
            StateUpdate {
                agent_result: Some(AgentResult::Planner(PlannerOutput::default())),
                ..StateUpdate::default()
            },
        );
        assert!(state.agent_results.planner.is_none());

        state.apply(
            PLANNER,
            StateUpdate {
                agent_result: Some(AgentResult::Planner(PlannerOutput::default())),
                ..StateUpdate::default()
            },
        );
        assert!(state.agent_results.planner.is_some());
    }

    #[test]
    fn searched_queries_never_repeat() {
        let mut state = ConversationState::default();
        let q = SearchQuery {
            site: "amazon".into(),
            query: "lenovo laptop".into(),
            source: "amazon".into(),
        };
        for _ in 0..2 {
            state.apply(
                RESEARCHER,
                StateUpdate {
                    searched_queries: vec![q.clone(), q.clone()],
                    ..StateUpdate::default()
                },
            );
        }
        assert_eq!(state.searched_queries.len(), 1);
        assert!(state.has_searched(&q));
    }

    #[test]
    fn reviewed_ids_must_be_known_products() {
        let mut state = ConversationState::default();
        state.apply(
            RESEARCHER,
            StateUpdate {
                current_products: Some(vec![product("a", 0.4), product("b", 0.8)]),
                ..StateUpdate::default()
            },
        );
        state.apply(
            REVIEWER,
            StateUpdate {
                reviewed_ids: vec!["a".into(), "zzz".into(), "b".into(), "a".into()],
                ..StateUpdate::default()
            },
        );
        assert_eq!(state.reviewed_products_ids, ["a", "b"]);
        let reviewed = state.reviewed_products();
        assert_eq!(reviewed[0].product_id, "b");
    }

    #[test]
    fn new_query_resets_the_run_but_keeps_history() {
        let mut state = ConversationState::default();
        state.apply(INPUT, StateUpdate::user_message(session(), WsMessage::default()));
        let first_run = state.run_id.clone();
        state.apply(
            RESEARCHER,
            StateUpdate {
                current_products: Some(vec![product("a", 0.4)]),
                new_messages: vec![ModelMessage::user("hi")],
                current_depth: Some(2),
                ..StateUpdate::default()
            },
        );
        state.apply(REVIEWER, StateUpdate { reviewed_ids: vec!["a".into()], ..StateUpdate::default() });

        state.apply(INPUT, StateUpdate::user_message(session(), WsMessage::default()));
        assert_ne!(state.run_id, first_run);
        assert!(state.current_products.is_empty());
        assert!(state.reviewed_products_ids.is_empty());
        assert_eq!(state.current_depth, 0);
        assert_eq!(state.all_products.len(), 1);
        assert_eq!(state.message_history.len(), 1);
        assert_eq!(state.previous_node.as_deref(), Some(INPUT));
    }

    #[test]
    fn depth_is_clamped_to_max() {
        let mut state = ConversationState::default();
        state.apply(INPUT, StateUpdate::user_message(session(), WsMessage::default()));
        state.apply(PLANNER, StateUpdate { current_depth: Some(9), ..StateUpdate::default() });
        assert_eq!(state.current_depth, 3);
    }

    #[test]
    fn human_reply_keeps_the_run() {
        let mut state = ConversationState::default();
        state.apply(INPUT, StateUpdate::user_message(session(), WsMessage::default()));
        let run = state.run_id.clone();
        state.apply(PLANNER, StateUpdate { next_node: Some(PLANNER.into()), ..StateUpdate::default() });
        state.apply(INPUT, StateUpdate::human_reply(session(), "under 300 USD"));
        assert_eq!(state.run_id, run);
        assert_eq!(state.human_response.as_deref(), Some("under 300 USD"));
        assert_eq!(state.resume_node().as_deref(), Some(PLANNER));
    }

    #[test]
    fn closing_a_run_gives_later_research_a_new_run_id() {
        let mut state = ConversationState::default();
        state.apply(INPUT, StateUpdate::user_message(session(), WsMessage::default()));
        let run = state.run_id.clone();
        state.apply(
            PLANNER,
            StateUpdate {
                next_node: Some(PLANNER.into()),
                close_run: true,
                ..StateUpdate::default()
            },
        );
        assert_ne!(state.run_id, run);

        let second = state.run_id.clone();
        state.apply(INPUT, StateUpdate::human_reply(session(), "now a thinkpad"));
        assert_eq!(state.run_id, second);
        assert_eq!(state.resume_node().as_deref(), Some(PLANNER));
    }
}
