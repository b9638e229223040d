// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event sink that records everything sent to it.

use std::sync::Mutex;

use async_trait::async_trait;

use volera_core::{EventSink, OutboundEvent, VoleraError};

/// Records `(ws_id, event)` pairs in send order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, OutboundEvent)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, OutboundEvent)> {
        self.lock().clone()
    }

    /// Events sent to one channel.
    pub fn events_for(&self, ws_id: &str) -> Vec<OutboundEvent> {
        self.lock()
            .iter()
            .filter(|(ws, _)| ws == ws_id)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Wire discriminators of the events sent to one channel.
    pub fn kinds_for(&self, ws_id: &str) -> Vec<&'static str> {
        self.events_for(ws_id).iter().map(OutboundEvent::kind).collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, OutboundEvent)>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send(&self, ws_id: &str, event: OutboundEvent) -> Result<(), VoleraError> {
        self.lock().push((ws_id.to_string(), event));
        Ok(())
    }
}
