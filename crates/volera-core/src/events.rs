// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client channel events.
//!
//! Outbound events are JSON objects discriminated by `type`. Inbound frames come
//! in a few historical shapes and are normalized into [`InboundEvent`].

use serde::{Deserialize, Serialize};

use crate::types::{OptimizationMode, ProductRecord};

/// Stage reported by a `progress` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Searching,
    Scraping,
    Comment,
}

/// Metadata attached to a cited source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub url: String,
    pub title: String,
}

/// A cited web source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "pageContent")]
    pub page_content: String,
    pub metadata: SourceMetadata,
}

/// An illustrative image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    pub url: String,
    pub img_url: String,
    pub title: String,
}

/// Totals reported when a search run finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTotals {
    pub total_searched: u32,
    pub total_scraped: u32,
}

/// An event pushed to the connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundEvent {
    #[serde(rename = "progress")]
    Progress {
        status: ProgressStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        searched: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scraped: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },
    #[serde(rename = "sources")]
    Sources { sources: Vec<Source> },
    #[serde(rename = "image_search")]
    ImageSearch { data: Vec<ImageResult> },
    #[serde(rename = "product")]
    Product {
        #[serde(rename = "messageId")]
        message_id: String,
        #[serde(rename = "chatId")]
        chat_id: String,
        role: String,
        products: Vec<ProductRecord>,
    },
    #[serde(rename = "message")]
    Message { content: String },
    #[serde(rename = "messageEnd")]
    MessageEnd { content: String },
    #[serde(rename = "error")]
    Error { data: String, key: String },
    #[serde(rename = "search_complete")]
    SearchComplete { data: SearchTotals },
}

impl OutboundEvent {
    /// The wire discriminator, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Sources { .. } => "sources",
            Self::ImageSearch { .. } => "image_search",
            Self::Product { .. } => "product",
            Self::Message { .. } => "message",
            Self::MessageEnd { .. } => "messageEnd",
            Self::Error { .. } => "error",
            Self::SearchComplete { .. } => "search_complete",
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","data":"serialization failed: {e}","key":"internal"}}"#)
        })
    }
}

/// A user message after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub content: String,
    pub focus_mode: Option<String>,
    pub optimization_mode: OptimizationMode,
    pub files: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawInbound {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    content: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<serde_json::Value>,
    #[serde(default, alias = "focusMode")]
    focus_mode: Option<String>,
    #[serde(default, alias = "optimizationMode")]
    optimization_mode: Option<OptimizationMode>,
    #[serde(default)]
    files: Vec<String>,
}

/// Error returned when an inbound frame cannot be understood.
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported event type: {0}")]
    UnsupportedType(String),
    #[error("frame carries no message content")]
    Empty,
}

impl InboundEvent {
    /// Parses a raw text frame.
    ///
    /// Accepts `{type: "AGENT_REQUEST" | "message", data | content | message}`.
    /// The payload may be a plain string or an object with its own `content`
    /// (and optional `focus_mode`, `optimization_mode`, `files`).
    pub fn parse(frame: &str) -> Result<Self, InboundError> {
        let raw: RawInbound = serde_json::from_str(frame)?;
        if let Some(kind) = raw.kind.as_deref()
            && kind != "AGENT_REQUEST"
            && kind != "message"
        {
            return Err(InboundError::UnsupportedType(kind.to_string()));
        }

        let mut event = InboundEvent {
            content: String::new(),
            focus_mode: raw.focus_mode,
            optimization_mode: raw.optimization_mode.unwrap_or_default(),
            files: raw.files,
        };

        let payload = raw.data.or(raw.content).or(raw.message).ok_or(InboundError::Empty)?;
        match payload {
            serde_json::Value::String(s) => event.content = s,
            serde_json::Value::Object(map) => {
                let nested = map
                    .get("content")
                    .or_else(|| map.get("message"))
                    .or_else(|| map.get("query"));
                if let Some(serde_json::Value::String(s)) = nested {
                    event.content = s.clone();
                }
                if let Some(serde_json::Value::String(f)) =
                    map.get("focus_mode").or_else(|| map.get("focusMode"))
                {
                    event.focus_mode = Some(f.clone());
                }
                if let Some(mode) = map
                    .get("optimization_mode")
                    .or_else(|| map.get("optimizationMode"))
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                {
                    event.optimization_mode = mode;
                }
                if let Some(serde_json::Value::Array(files)) = map.get("files") {
                    event.files = files
                        .iter()
                        .filter_map(|f| f.as_str().map(str::to_string))
                        .collect();
                }
            }
            _ => return Err(InboundError::Empty),
        }

        if event.content.trim().is_empty() {
            return Err(InboundError::Empty);
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_event_wire_shape() {
        let event = OutboundEvent::Progress {
            status: ProgressStatus::Searching,
            searched: Some("lenovo laptop amazon".into()),
            scraped: None,
            comment: None,
        };
        let v: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(v["type"], "progress");
        assert_eq!(v["status"], "searching");
        assert_eq!(v["searched"], "lenovo laptop amazon");
        assert!(v.get("scraped").is_none());
    }

    #[test]
    fn product_event_uses_camel_case_ids() {
        let event = OutboundEvent::Product {
            message_id: "m1".into(),
            chat_id: "c1".into(),
            role: "assistant".into(),
            products: vec![],
        };
        let v: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(v["type"], "product");
        assert_eq!(v["messageId"], "m1");
        assert_eq!(v["chatId"], "c1");
    }

    #[test]
    fn message_end_and_search_complete_tags() {
        let end = serde_json::to_value(OutboundEvent::MessageEnd { content: "".into() }).unwrap();
        assert_eq!(end["type"], "messageEnd");
        let done = serde_json::to_value(OutboundEvent::SearchComplete {
            data: SearchTotals {
                total_searched: 2,
                total_scraped: 3,
            },
        })
        .unwrap();
        assert_eq!(done["type"], "search_complete");
        assert_eq!(done["data"]["total_scraped"], 3);
    }

    #[test]
    fn sources_use_page_content_key() {
        let v = serde_json::to_value(OutboundEvent::Sources {
            sources: vec![Source {
                page_content: "snippet".into(),
                metadata: SourceMetadata {
                    url: "https://a".into(),
                    title: "A".into(),
                },
            }],
        })
        .unwrap();
        assert_eq!(v["sources"][0]["pageContent"], "snippet");
        assert_eq!(v["sources"][0]["metadata"]["url"], "https://a");
    }

    #[test]
    fn inbound_agent_request_with_object_payload() {
        let e = InboundEvent::parse(
            r#"{"type":"AGENT_REQUEST","data":{"content":"a good phone","optimization_mode":"fast"}}"#,
        )
        .unwrap();
        assert_eq!(e.content, "a good phone");
        assert_eq!(e.optimization_mode, OptimizationMode::Fast);
    }

    #[test]
    fn inbound_message_with_plain_content() {
        let e = InboundEvent::parse(r#"{"type":"message","content":"under 300 USD"}"#).unwrap();
        assert_eq!(e.content, "under 300 USD");
        assert_eq!(e.optimization_mode, OptimizationMode::Balanced);
    }

    #[test]
    fn inbound_message_field_fallback() {
        let e = InboundEvent::parse(r#"{"message":"hello"}"#).unwrap();
        assert_eq!(e.content, "hello");
    }

    #[test]
    fn inbound_rejects_unknown_type_and_empty() {
        assert!(matches!(
            InboundEvent::parse(r#"{"type":"ping","data":"x"}"#),
            Err(InboundError::UnsupportedType(_))
        ));
        assert!(matches!(
            InboundEvent::parse(r#"{"type":"message","content":"  "}"#),
            Err(InboundError::Empty)
        ));
        assert!(InboundEvent::parse("not json").is_err());
    }
}
