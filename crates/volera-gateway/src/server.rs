// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use volera_config::model::GatewayConfig;
use volera_core::{PluginAdapter, VoleraError};

use crate::channels::ChannelRegistry;
use crate::conversation::ConversationService;
use crate::{handlers, ws};

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<ChannelRegistry>,
    pub conversations: ConversationService,
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// External collaborators reported by `/health` and shut down on exit.
    pub adapters: Vec<Arc<dyn PluginAdapter>>,
}

impl GatewayState {
    pub fn new(registry: Arc<ChannelRegistry>, conversations: ConversationService) -> Self {
        Self {
            registry,
            conversations,
            start_time: std::time::Instant::now(),
            adapters: Vec::new(),
        }
    }

    pub fn with_adapters(mut self, adapters: Vec<Arc<dyn PluginAdapter>>) -> Self {
        self.adapters = adapters;
        self
    }

    /// Shut every adapter down. Failures are logged; the rest still run.
    pub async fn shutdown_adapters(&self) {
        for adapter in &self.adapters {
            match adapter.shutdown().await {
                Ok(()) => tracing::debug!(adapter = adapter.name(), "adapter shut down"),
                Err(e) => tracing::warn!(adapter = adapter.name(), error = %e, "adapter shutdown failed"),
            }
        }
    }
}

/// Routes:
/// - GET /health
/// - GET /ws?user_id=...&chat_id=...
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds to the configured host:port and serves until `cancel` fires.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), VoleraError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| VoleraError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| VoleraError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
