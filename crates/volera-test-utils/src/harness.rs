// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the research pipeline with mock collaborators, a
//! temp SQLite database (credit ledger and checkpoints), and a recording
//! event sink. `send()` drives one user turn through the graph.

use std::sync::Arc;
use std::time::Duration;

use volera_agent::{AgentRuntime, RetryPolicy};
use volera_config::model::{CreditsConfig, ResearchConfig};
use volera_config::VoleraConfig;
use volera_core::events::OutboundEvent;
use volera_core::types::WsMessage;
use volera_core::VoleraError;
use volera_credits::CreditLedger;
use volera_graph::GraphOutcome;
use volera_research::{
    build_research_graph, run_turn, ConversationState, ResearchContext, ResearchGraph, SessionInfo,
};
use volera_storage::{Database, SqliteCheckpointer};

use crate::mock_provider::MockProvider;
use crate::mock_tools::{MockCrawler, MockSearch};
use crate::recording_sink::RecordingSink;

/// User id every harness turn runs as.
pub const TEST_USER: &str = "test-user";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    provider: MockProvider,
    search: MockSearch,
    crawler: MockCrawler,
    balance: i64,
    daily_limit: Option<i64>,
    research: ResearchConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            provider: MockProvider::new(),
            search: MockSearch::new(),
            crawler: MockCrawler::new(),
            balance: 1_000,
            daily_limit: None,
            research: ResearchConfig::default(),
        }
    }

    pub fn with_provider(mut self, provider: MockProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_search(mut self, search: MockSearch) -> Self {
        self.search = search;
        self
    }

    pub fn with_crawler(mut self, crawler: MockCrawler) -> Self {
        self.crawler = crawler;
        self
    }

    /// Starting balance of [`TEST_USER`].
    pub fn with_balance(mut self, balance: i64) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_daily_limit(mut self, limit: i64) -> Self {
        self.daily_limit = Some(limit);
        self
    }

    pub fn with_research(mut self, research: ResearchConfig) -> Self {
        self.research = research;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, VoleraError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| VoleraError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();
        let database = Database::open(&db_path).await?;

        let config = VoleraConfig {
            credits: CreditsConfig {
                initial_balance: self.balance,
                daily_limit: self.daily_limit,
                ..CreditsConfig::default()
            },
            research: self.research,
            ..VoleraConfig::default()
        };

        let ledger = Arc::new(CreditLedger::new(database.connection().clone(), &config.credits)?);
        let provider = Arc::new(self.provider);
        let runtime = AgentRuntime::new(
            provider.clone(),
            ledger.clone(),
            RetryPolicy {
                max_retries: 0,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                call_timeout: Duration::from_secs(5),
            },
        );

        let search = Arc::new(self.search);
        let crawler = Arc::new(self.crawler);
        let sink = Arc::new(RecordingSink::new());
        let ctx = ResearchContext::new(
            runtime,
            search.clone(),
            crawler.clone(),
            sink.clone(),
            config.research.clone(),
        )
        .with_crawler_config(&config.crawler);
        let checkpointer = Arc::new(SqliteCheckpointer::from_config(database.clone(), &config.checkpoint));
        let graph = Arc::new(build_research_graph(ctx, checkpointer, config.checkpoint.recursion_limit)?);

        Ok(TestHarness {
            provider,
            search,
            crawler,
            sink,
            ledger,
            database,
            graph,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete research environment with mock collaborators and temp storage.
pub struct TestHarness {
    /// The mock LLM provider.
    pub provider: Arc<MockProvider>,
    pub search: Arc<MockSearch>,
    pub crawler: Arc<MockCrawler>,
    /// Every event sent to a client.
    pub sink: Arc<RecordingSink>,
    pub ledger: Arc<CreditLedger>,
    /// SQLite database (temp file, cleaned up on drop).
    pub database: Database,
    pub graph: Arc<ResearchGraph>,
    pub config: VoleraConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Sends one user message on conversation `ws_id` and runs the graph
    /// until it ends or waits for the user.
    pub async fn send(&self, ws_id: &str, text: &str) -> Result<GraphOutcome<ConversationState>, VoleraError> {
        let session = SessionInfo {
            user_id: TEST_USER.to_string(),
            ws_id: ws_id.to_string(),
            chat_id: ws_id.to_string(),
            model: self.config.agent.default_model.clone(),
            max_depth: self.config.research.max_depth,
        };
        let message = WsMessage {
            content: text.to_string(),
            ..WsMessage::default()
        };
        run_turn(&self.graph, ws_id, session, message).await
    }

    /// Events sent to `ws_id`, in order.
    pub fn events(&self, ws_id: &str) -> Vec<OutboundEvent> {
        self.sink.events_for(ws_id)
    }

    pub async fn balance(&self) -> Result<i64, VoleraError> {
        self.ledger.balance(TEST_USER).await
    }
}
