// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Status events pushed from the pipeline to the connected client.

use std::sync::Arc;

use tracing::debug;
use volera_core::events::{
    ImageResult, OutboundEvent, ProgressStatus, SearchTotals, Source,
};
use volera_core::{EventSink, ProductRecord, VoleraError};

/// A handle on one client's outbound channel.
///
/// Progress is advisory: the `emit` helpers never fail the pipeline when the
/// client has gone away. Use [`send`](Self::send) when delivery matters.
#[derive(Clone)]
pub struct ProgressChannel {
    sink: Arc<dyn EventSink>,
    ws_id: String,
}

impl ProgressChannel {
    pub fn new(sink: Arc<dyn EventSink>, ws_id: impl Into<String>) -> Self {
        Self {
            sink,
            ws_id: ws_id.into(),
        }
    }

    pub fn ws_id(&self) -> &str {
        &self.ws_id
    }

    pub async fn send(&self, event: OutboundEvent) -> Result<(), VoleraError> {
        self.sink.send(&self.ws_id, event).await
    }

    /// Sends `event`, logging instead of failing when the client is gone.
    pub async fn emit(&self, event: OutboundEvent) {
        let kind = event.kind();
        if let Err(e) = self.sink.send(&self.ws_id, event).await {
            debug!(ws_id = self.ws_id.as_str(), kind, error = %e, "progress event dropped");
        }
    }

    pub async fn searching(&self, query: &str) {
        self.emit(OutboundEvent::Progress {
            status: ProgressStatus::Searching,
            searched: Some(query.to_string()),
            scraped: None,
            comment: None,
        })
        .await;
    }

    pub async fn scraping(&self, url: &str) {
        self.emit(OutboundEvent::Progress {
            status: ProgressStatus::Scraping,
            searched: None,
            scraped: Some(url.to_string()),
            comment: None,
        })
        .await;
    }

    pub async fn comment(&self, text: impl Into<String>) {
        self.emit(OutboundEvent::Progress {
            status: ProgressStatus::Comment,
            searched: None,
            scraped: None,
            comment: Some(text.into()),
        })
        .await;
    }

    pub async fn sources(&self, sources: Vec<Source>) {
        self.emit(OutboundEvent::Sources { sources }).await;
    }

    pub async fn images(&self, data: Vec<ImageResult>) {
        self.emit(OutboundEvent::ImageSearch { data }).await;
    }

    pub async fn products(&self, message_id: &str, chat_id: &str, products: Vec<ProductRecord>) {
        self.emit(OutboundEvent::Product {
            message_id: message_id.to_string(),
            chat_id: chat_id.to_string(),
            role: "assistant".to_string(),
            products,
        })
        .await;
    }

    pub async fn message(&self, content: impl Into<String>) {
        self.emit(OutboundEvent::Message {
            content: content.into(),
        })
        .await;
    }

    pub async fn message_end(&self, content: impl Into<String>) {
        self.emit(OutboundEvent::MessageEnd {
            content: content.into(),
        })
        .await;
    }

    pub async fn error(&self, data: impl Into<String>, key: impl Into<String>) {
        self.emit(OutboundEvent::Error {
            data: data.into(),
            key: key.into(),
        })
        .await;
    }

    pub async fn search_complete(&self, total_searched: u32, total_scraped: u32) {
        self.emit(OutboundEvent::SearchComplete {
            data: SearchTotals {
                total_searched,
                total_scraped,
            },
        })
        .await;
    }
}
