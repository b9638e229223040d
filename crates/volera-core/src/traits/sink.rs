// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound event delivery.

use async_trait::async_trait;

use crate::error::VoleraError;
use crate::events::OutboundEvent;

/// Delivers events to a connected client identified by its channel id.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn send(&self, ws_id: &str, event: OutboundEvent) -> Result<(), VoleraError>;
}
