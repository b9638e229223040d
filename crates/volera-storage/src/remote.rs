// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST client for an Appwrite-style document database.
//!
//! Documents live at
//! `{endpoint}/databases/{database}/collections/{collection}/documents/{id}`.
//! Server metadata keys (`$id`, `$createdAt`, ...) are stripped from returned
//! documents; `$id` becomes [`Document::id`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};
use volera_config::model::RemoteStoreConfig;
use volera_core::types::{AdapterType, Document, HealthStatus, StoreQuery};
use volera_core::{DurableStore, PluginAdapter, VoleraError};

pub struct AppwriteStore {
    client: reqwest::Client,
    endpoint: String,
    database_id: String,
}

#[derive(Debug, Deserialize)]
struct DocumentList {
    #[serde(default)]
    documents: Vec<Map<String, Value>>,
}

fn remote_err(message: impl Into<String>, source: Option<reqwest::Error>) -> VoleraError {
    VoleraError::RemoteStore {
        message: message.into(),
        source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
    }
}

/// Split a raw document into id and user data.
fn into_document(mut raw: Map<String, Value>) -> Result<Document, VoleraError> {
    let id = match raw.remove("$id") {
        Some(Value::String(id)) => id,
        _ => return Err(remote_err("document without $id", None)),
    };
    raw.retain(|key, _| !key.starts_with('$'));
    Ok(Document {
        id,
        data: Value::Object(raw),
    })
}

/// Encode one predicate in the JSON query syntax.
pub fn encode_query(query: &StoreQuery) -> String {
    let value = match query {
        StoreQuery::Equal(attribute, value) => {
            json!({"method": "equal", "attribute": attribute, "values": [value]})
        }
        StoreQuery::OrderAsc(attribute) => json!({"method": "orderAsc", "attribute": attribute}),
        StoreQuery::OrderDesc(attribute) => json!({"method": "orderDesc", "attribute": attribute}),
        StoreQuery::Limit(n) => json!({"method": "limit", "values": [n]}),
    };
    value.to_string()
}

impl AppwriteStore {
    pub fn new(config: &RemoteStoreConfig) -> Result<Self, VoleraError> {
        let endpoint = config
            .endpoint
            .clone()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| VoleraError::Config("store.endpoint is not set".into()))?;
        let project_id = config
            .project_id
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| VoleraError::Config("store.project_id is not set".into()))?;
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                VoleraError::Config(
                    "remote store API key not found. Set store.api_key or APPWRITE_API_KEY.".into(),
                )
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-appwrite-project",
            HeaderValue::from_str(&project_id)
                .map_err(|e| VoleraError::Config(format!("invalid project id header: {e}")))?,
        );
        headers.insert(
            "x-appwrite-key",
            HeaderValue::from_str(&api_key)
                .map_err(|e| VoleraError::Config(format!("invalid store API key header: {e}")))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| remote_err("failed to build HTTP client", Some(e)))?;

        info!(endpoint = %endpoint, database = %config.database_id, "remote store client initialized");
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            database_id: config.database_id.clone(),
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.endpoint, self.database_id, collection
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}", self.collection_url(collection), id)
    }

    async fn read_document(response: reqwest::Response) -> Result<Document, VoleraError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(remote_err(format!("HTTP {status}: {body}"), None));
        }
        let raw: Map<String, Value> = response
            .json()
            .await
            .map_err(|e| remote_err("malformed document response", Some(e)))?;
        into_document(raw)
    }
}

#[async_trait]
impl PluginAdapter for AppwriteStore {
    fn name(&self) -> &str {
        "appwrite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RemoteStore
    }

    async fn health_check(&self) -> Result<HealthStatus, VoleraError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VoleraError> {
        Ok(())
    }
}

#[async_trait]
impl DurableStore for AppwriteStore {
    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> Result<Document, VoleraError> {
        debug!(collection, id, "creating remote document");
        let response = self
            .client
            .post(self.collection_url(collection))
            .json(&json!({ "documentId": id, "data": data }))
            .send()
            .await
            .map_err(|e| remote_err(format!("create {collection}/{id} failed"), Some(e)))?;
        Self::read_document(response).await
    }

    async fn list_documents(
        &self,
        collection: &str,
        queries: &[StoreQuery],
    ) -> Result<Vec<Document>, VoleraError> {
        let params: Vec<(&str, String)> =
            queries.iter().map(|q| ("queries[]", encode_query(q))).collect();
        let response = self
            .client
            .get(self.collection_url(collection))
            .query(&params)
            .send()
            .await
            .map_err(|e| remote_err(format!("list {collection} failed"), Some(e)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(remote_err(format!("HTTP {status}: {body}"), None));
        }
        let list: DocumentList = response
            .json()
            .await
            .map_err(|e| remote_err("malformed document list", Some(e)))?;
        list.documents.into_iter().map(into_document).collect()
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, VoleraError> {
        let response = self
            .client
            .get(self.document_url(collection, id))
            .send()
            .await
            .map_err(|e| remote_err(format!("get {collection}/{id} failed"), Some(e)))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::read_document(response).await.map(Some)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> Result<Document, VoleraError> {
        let response = self
            .client
            .patch(self.document_url(collection, id))
            .json(&json!({ "data": data }))
            .send()
            .await
            .map_err(|e| remote_err(format!("update {collection}/{id} failed"), Some(e)))?;
        Self::read_document(response).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), VoleraError> {
        let response = self
            .client
            .delete(self.document_url(collection, id))
            .send()
            .await
            .map_err(|e| remote_err(format!("delete {collection}/{id} failed"), Some(e)))?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(remote_err(format!("HTTP {status} deleting {collection}/{id}"), None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: &str) -> RemoteStoreConfig {
        RemoteStoreConfig {
            endpoint: Some(endpoint.to_string()),
            project_id: Some("proj".to_string()),
            api_key: Some("secret".to_string()),
            ..RemoteStoreConfig::default()
        }
    }

    const DOCS: &str = "/databases/volera/collections/chats/documents";

    #[test]
    fn missing_endpoint_is_config_error() {
        let cfg = RemoteStoreConfig::default();
        assert!(matches!(AppwriteStore::new(&cfg), Err(VoleraError::Config(_))));
    }

    #[test]
    fn queries_encode_as_json() {
        let q = encode_query(&StoreQuery::Equal("user_id".into(), json!("u1")));
        let parsed: Value = serde_json::from_str(&q).unwrap();
        assert_eq!(parsed["method"], "equal");
        assert_eq!(parsed["values"][0], "u1");
        assert_eq!(encode_query(&StoreQuery::Limit(5)), r#"{"method":"limit","values":[5]}"#);
    }

    #[tokio::test]
    async fn create_sends_headers_and_strips_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DOCS))
            .and(header("x-appwrite-project", "proj"))
            .and(header("x-appwrite-key", "secret"))
            .and(body_partial_json(json!({"documentId": "c1"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "$id": "c1",
                "$createdAt": "2026-01-01T00:00:00.000+00:00",
                "title": "phones"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = AppwriteStore::new(&config(&server.uri())).unwrap();
        let doc = store
            .create_document("chats", "c1", json!({"title": "phones"}))
            .await
            .unwrap();
        assert_eq!(doc.id, "c1");
        assert_eq!(doc.data, json!({"title": "phones"}));
    }

    #[tokio::test]
    async fn get_missing_document_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{DOCS}/nope")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "not found"})))
            .mount(&server)
            .await;

        let store = AppwriteStore::new(&config(&server.uri())).unwrap();
        assert!(store.get_document("chats", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_passes_queries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOCS))
            .and(query_param("queries[]", r#"{"method":"limit","values":[2]}"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 2,
                "documents": [{"$id": "a", "title": "x"}, {"$id": "b", "title": "y"}]
            })))
            .mount(&server)
            .await;

        let store = AppwriteStore::new(&config(&server.uri())).unwrap();
        let docs = store
            .list_documents("chats", &[StoreQuery::Limit(2)])
            .await
            .unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn server_error_surfaces_as_remote_store_error() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{DOCS}/c1")))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let store = AppwriteStore::new(&config(&server.uri())).unwrap();
        let err = store
            .update_document("chats", "c1", json!({"title": "t"}))
            .await
            .unwrap_err();
        assert!(matches!(err, VoleraError::RemoteStore { .. }));
    }
}
