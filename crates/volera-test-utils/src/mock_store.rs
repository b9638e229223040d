// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory durable store.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use volera_core::types::{AdapterType, Document, HealthStatus, StoreQuery};
use volera_core::{DurableStore, PluginAdapter, VoleraError};

/// A `DurableStore` backed by a map of `(collection, id)` to document data.
///
/// Supports equality filters, single-field ordering, and limits, which is
/// all the reconciler uses.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    docs: Mutex<BTreeMap<(String, String), Value>>,
    unavailable: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with a remote store error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Value> {
        self.lock()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    pub fn count(&self, collection: &str) -> usize {
        self.lock().keys().filter(|(c, _)| c == collection).count()
    }

    /// Documents of a collection, in id order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.lock()
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((_, id), data)| Document {
                id: id.clone(),
                data: data.clone(),
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<(String, String), Value>> {
        self.docs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), VoleraError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(VoleraError::RemoteStore {
                message: "store unavailable".to_string(),
                source: None,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for InMemoryDocumentStore {
    fn name(&self) -> &str {
        "memory-store"
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
impl DurableStore for InMemoryDocumentStore {
    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> Result<Document, VoleraError> {
        self.check_available()?;
        let key = (collection.to_string(), id.to_string());
        let mut docs = self.lock();
        if docs.contains_key(&key) {
            return Err(VoleraError::RemoteStore {
                message: format!("document {id} already exists in {collection}"),
                source: None,
            });
        }
        docs.insert(key, data.clone());
        Ok(Document {
            id: id.to_string(),
            data,
        })
    }

    async fn list_documents(
        &self,
        collection: &str,
        queries: &[StoreQuery],
    ) -> Result<Vec<Document>, VoleraError> {
        self.check_available()?;
        let mut found: Vec<Document> = self
            .documents(collection)
            .into_iter()
            .filter(|doc| {
                queries.iter().all(|q| match q {
                    StoreQuery::Equal(field, value) => doc.data.get(field) == Some(value),
                    _ => true,
                })
            })
            .collect();

        for query in queries {
            match query {
                StoreQuery::OrderAsc(field) => {
                    found.sort_by(|a, b| compare(a.data.get(field), b.data.get(field)));
                }
                StoreQuery::OrderDesc(field) => {
                    found.sort_by(|a, b| compare(b.data.get(field), a.data.get(field)));
                }
                _ => {}
            }
        }
        if let Some(limit) = queries.iter().find_map(|q| match q {
            StoreQuery::Limit(n) => Some(*n as usize),
            _ => None,
        }) {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, VoleraError> {
        self.check_available()?;
        Ok(self.document(collection, id).map(|data| Document {
            id: id.to_string(),
            data,
        }))
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> Result<Document, VoleraError> {
        self.check_available()?;
        let mut docs = self.lock();
        let Some(existing) = docs.get_mut(&(collection.to_string(), id.to_string())) else {
            return Err(VoleraError::RemoteStore {
                message: format!("document {id} not found in {collection}"),
                source: None,
            });
        };
        if let (Value::Object(target), Value::Object(patch)) = (&mut *existing, data) {
            for (k, v) in patch {
                target.insert(k, v);
            }
        }
        Ok(Document {
            id: id.to_string(),
            data: existing.clone(),
        })
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), VoleraError> {
        self.check_available()?;
        self.lock().remove(&(collection.to_string(), id.to_string()));
        Ok(())
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .unwrap_or_default()
            .total_cmp(&y.as_f64().unwrap_or_default()),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        _ => std::cmp::Ordering::Equal,
    }
}
