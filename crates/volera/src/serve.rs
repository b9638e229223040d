// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `volera serve` command implementation.
//!
//! Opens the local database, recovers sessions a previous process left
//! active, builds the research graph over the configured provider, search,
//! and crawler, then serves the WebSocket gateway with the sync loop running
//! beside it until a shutdown signal arrives.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use volera_agent::{shutdown, AgentRuntime, RetryPolicy};
use volera_cache::Memoizer;
use volera_config::VoleraConfig;
use volera_core::{PluginAdapter, SearchTool, VoleraError};
use volera_credits::CreditLedger;
use volera_gateway::{start_server, ChannelRegistry, ConversationService, GatewayState};
use volera_openrouter::OpenRouterProvider;
use volera_research::{build_research_graph, ResearchContext};
use volera_storage::{AppwriteStore, Database, SessionBuffer, SqliteCheckpointer, SyncService};
use volera_tools::{CachedSearch, HttpCrawler, SerperSearch};

/// Runs the `volera serve` command.
pub async fn run_serve(config: VoleraConfig) -> Result<(), VoleraError> {
    init_tracing(&config.agent.log_level);

    info!(name = %config.agent.name, "starting volera serve");

    let database = Database::open(&config.storage.database_path).await?;

    // Turns from a crashed process are pending from here on.
    let buffer = SessionBuffer::new(database.clone());
    buffer.recover_stale().await?;

    let checkpointer = Arc::new(SqliteCheckpointer::from_config(database.clone(), &config.checkpoint));
    if let Err(e) = checkpointer.purge_expired().await {
        warn!(error = %e, "checkpoint purge failed, continuing");
    }

    let ledger = Arc::new(CreditLedger::new(database.connection().clone(), &config.credits)?);

    let provider = Arc::new(OpenRouterProvider::new(&config.llm).map_err(|e| {
        error!(error = %e, "failed to initialize LLM provider");
        eprintln!("error: LLM API key required. Set via: config llm.api_key or OPENROUTER_API_KEY env var");
        e
    })?);
    let runtime = AgentRuntime::new(provider.clone(), ledger, RetryPolicy::from_config(&config.llm));

    // One memo table for the process, shared by search and page fetches.
    let memo = Arc::new(Memoizer::from_config(&config.cache));
    let search = Arc::new(CachedSearch::new(
        Arc::new(SerperSearch::new(&config.search)?),
        memo.clone(),
    ));
    let crawler = Arc::new(HttpCrawler::new(&config.crawler, config.research.crawl_concurrency)?.with_memo(memo));
    let mut adapters: Vec<Arc<dyn PluginAdapter>> = Vec::new();
    adapters.push(provider);
    adapters.push(search.clone());
    adapters.push(crawler.clone());
    let search: Arc<dyn SearchTool> = search;

    let registry = Arc::new(ChannelRegistry::new());
    let ctx = ResearchContext::new(runtime, search, crawler, registry.clone(), config.research.clone())
        .with_crawler_config(&config.crawler);
    let graph = Arc::new(build_research_graph(ctx, checkpointer, config.checkpoint.recursion_limit)?);
    info!(max_depth = config.research.max_depth, "research graph compiled");

    let conversations = ConversationService::new(
        graph,
        buffer,
        config.agent.default_model.clone(),
        config.research.max_depth,
    );

    let cancel = shutdown::install_signal_handler();
    let sync_task = spawn_sync(&config, &database, cancel.clone()).map(|(task, store)| {
        adapters.push(store);
        task
    });

    let state = GatewayState::new(registry, conversations).with_adapters(adapters);
    let served = start_server(&config.gateway, state.clone(), cancel.clone()).await;

    // The gateway may have stopped on its own; stop the sync loop either way.
    cancel.cancel();
    if let Some(task) = sync_task
        && let Err(e) = task.await
    {
        warn!(error = %e, "sync task ended abnormally");
    }
    state.shutdown_adapters().await;
    if let Err(e) = database.close().await {
        warn!(error = %e, "database close failed");
    }

    served?;
    info!("volera stopped");
    Ok(())
}

/// Starts the background reconciler when sync is enabled and the durable
/// store is configured, returning its task and the store adapter. A missing
/// store disables sync rather than failing startup; buffered rows wait for a
/// later run.
fn spawn_sync(
    config: &VoleraConfig,
    database: &Database,
    cancel: CancellationToken,
) -> Option<(JoinHandle<()>, Arc<dyn PluginAdapter>)> {
    if !config.sync.enabled {
        info!("session sync disabled by configuration");
        return None;
    }
    match AppwriteStore::new(&config.store) {
        Ok(store) => {
            let store = Arc::new(store);
            let service = SyncService::new(database.clone(), store.clone(), &config.sync, &config.store);
            info!(interval_secs = config.sync.interval_secs, "session sync started");
            let adapter: Arc<dyn PluginAdapter> = store;
            Some((Arc::new(service).spawn(cancel), adapter))
        }
        Err(e) => {
            warn!(error = %e, "durable store not configured, session sync disabled");
            None
        }
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("volera={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
