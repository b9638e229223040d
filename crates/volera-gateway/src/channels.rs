// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing of outbound events to connected sockets.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use volera_core::{EventSink, OutboundEvent, VoleraError};

/// Frames buffered per socket before senders wait.
const CHANNEL_CAPACITY: usize = 64;

/// Process-wide map of `ws_id` to the socket's outbound queue.
#[derive(Default)]
pub struct ChannelRegistry {
    senders: DashMap<String, mpsc::Sender<String>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a socket and returns the receiving end of its queue.
    pub fn register(&self, ws_id: &str) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.senders.insert(ws_id.to_string(), tx);
        rx
    }

    pub fn unregister(&self, ws_id: &str) -> bool {
        self.senders.remove(ws_id).is_some()
    }

    pub fn is_connected(&self, ws_id: &str) -> bool {
        self.senders.contains_key(ws_id)
    }

    /// Number of connected sockets.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

#[async_trait]
impl EventSink for ChannelRegistry {
    async fn send(&self, ws_id: &str, event: OutboundEvent) -> Result<(), VoleraError> {
        // Clone the sender so no map guard is held across the await.
        let tx = self
            .senders
            .get(ws_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| VoleraError::Channel {
                message: format!("no socket for {ws_id}"),
                source: None,
            })?;
        debug!(ws_id, kind = event.kind(), "event queued");
        tx.send(event.to_json()).await.map_err(|e| VoleraError::Channel {
            message: format!("socket {ws_id} closed"),
            source: Some(Box::new(e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_the_registered_socket_in_order() {
        let registry = ChannelRegistry::new();
        let mut rx = registry.register("ws-1");
        registry
            .send("ws-1", OutboundEvent::Message { content: "a".into() })
            .await
            .unwrap();
        registry
            .send("ws-1", OutboundEvent::MessageEnd { content: "a".into() })
            .await
            .unwrap();

        let first: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        let second: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first["type"], "message");
        assert_eq!(second["type"], "messageEnd");
    }

    #[tokio::test]
    async fn unknown_or_closed_socket_is_a_channel_error() {
        let registry = ChannelRegistry::new();
        let err = registry
            .send("nobody", OutboundEvent::Message { content: "x".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, VoleraError::Channel { .. }));

        let rx = registry.register("ws-2");
        drop(rx);
        let err = registry
            .send("ws-2", OutboundEvent::Message { content: "x".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, VoleraError::Channel { .. }));

        assert!(registry.unregister("ws-2"));
        assert!(registry.is_empty());
    }
}
