// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP handlers.

use std::time::Duration;

use axum::extract::State;
use axum::Json;
use futures::future::join_all;
use serde::Serialize;
use volera_core::types::HealthStatus;
use volera_core::PluginAdapter;

use crate::server::GatewayState;

/// Longest a single adapter may take to answer a health check.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` when every adapter is healthy, `degraded` otherwise.
    pub status: &'static str,
    pub version: &'static str,
    pub connections: usize,
    pub uptime_secs: u64,
    pub adapters: Vec<AdapterHealth>,
}

#[derive(Debug, Serialize)]
pub struct AdapterHealth {
    pub name: String,
    pub kind: String,
    pub version: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

async fn check(adapter: &dyn PluginAdapter) -> AdapterHealth {
    let (status, detail) = match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, adapter.health_check()).await {
        Ok(Ok(HealthStatus::Healthy)) => ("healthy", None),
        Ok(Ok(HealthStatus::Degraded(why))) => ("degraded", Some(why)),
        Ok(Ok(HealthStatus::Unhealthy(why))) => ("unhealthy", Some(why)),
        Ok(Err(e)) => ("unhealthy", Some(e.to_string())),
        Err(_) => ("unhealthy", Some("health check timed out".to_string())),
    };
    AdapterHealth {
        name: adapter.name().to_string(),
        kind: adapter.adapter_type().to_string(),
        version: adapter.version().to_string(),
        status,
        detail,
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let adapters = join_all(state.adapters.iter().map(|a| check(a.as_ref()))).await;
    let status = if adapters.iter().all(|a| a.status == "healthy") {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        connections: state.registry.len(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        adapters,
    })
}
