// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use volera_config::model::{RemoteStoreConfig, SyncConfig};
use volera_core::types::{AdapterType, Document, HealthStatus, MessageRole, StoreQuery};
use volera_core::{DurableStore, PluginAdapter, VoleraError};
use volera_storage::{Database, SessionBuffer, SyncService, SyncStatus};

/// Collections in memory; can be switched to fail every message write.
#[derive(Default)]
struct FakeStore {
    docs: Mutex<BTreeMap<(String, String), Value>>,
    fail_messages: AtomicBool,
    creates: Mutex<Vec<(String, String)>>,
}

impl FakeStore {
    fn ids(&self, collection: &str) -> HashSet<String> {
        self.docs
            .lock()
            .unwrap()
            .keys()
            .filter(|(c, _)| c == collection)
            .map(|(_, id)| id.clone())
            .collect()
    }

    fn get(&self, collection: &str, id: &str) -> Option<Value> {
        self.docs
            .lock()
            .unwrap()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl PluginAdapter for FakeStore {
    fn name(&self) -> &str {
        "fake"
    }
    fn version(&self) -> semver::Version {
        semver::Version::new(0, 0, 0)
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
impl DurableStore for FakeStore {
    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> Result<Document, VoleraError> {
        if collection == "messages" && self.fail_messages.load(Ordering::SeqCst) {
            return Err(VoleraError::RemoteStore {
                message: "unavailable".into(),
                source: None,
            });
        }
        self.creates
            .lock()
            .unwrap()
            .push((collection.to_string(), id.to_string()));
        self.docs
            .lock()
            .unwrap()
            .insert((collection.to_string(), id.to_string()), data.clone());
        Ok(Document {
            id: id.to_string(),
            data,
        })
    }

    async fn list_documents(
        &self,
        collection: &str,
        _queries: &[StoreQuery],
    ) -> Result<Vec<Document>, VoleraError> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((_, id), data)| Document {
                id: id.clone(),
                data: data.clone(),
            })
            .collect())
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, VoleraError> {
        Ok(self.get(collection, id).map(|data| Document {
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
        let mut docs = self.docs.lock().unwrap();
        let entry = docs
            .get_mut(&(collection.to_string(), id.to_string()))
            .ok_or_else(|| VoleraError::RemoteStore {
                message: "missing".into(),
                source: None,
            })?;
        if let (Some(target), Some(patch)) = (entry.as_object_mut(), data.as_object()) {
            for (k, v) in patch {
                target.insert(k.clone(), v.clone());
            }
        }
        Ok(Document {
            id: id.to_string(),
            data: entry.clone(),
        })
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), VoleraError> {
        self.docs
            .lock()
            .unwrap()
            .remove(&(collection.to_string(), id.to_string()));
        Ok(())
    }
}

fn service(db: &Database, store: Arc<FakeStore>) -> SyncService {
    SyncService::new(
        db.clone(),
        store,
        &SyncConfig::default(),
        &RemoteStoreConfig::default(),
    )
}

#[tokio::test]
async fn restart_recovers_pending_turns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("volera.db");
    let path = path.to_str().unwrap();

    // First process: two user turns, then it dies without closing the session.
    {
        let db = Database::open(path).await.unwrap();
        let buffer = SessionBuffer::new(db.clone());
        buffer.open("chat-1", "user-1", None, &[]).await.unwrap();
        buffer
            .append("chat-1", MessageRole::Human, "a good phone", Value::Null)
            .await
            .unwrap();
        buffer
            .append("chat-1", MessageRole::Assistant, "What is your budget?", Value::Null)
            .await
            .unwrap();
        buffer
            .append("chat-1", MessageRole::Human, "under 300 USD", Value::Null)
            .await
            .unwrap();
    }

    // Second process.
    let db = Database::open(path).await.unwrap();
    let buffer = SessionBuffer::new(db.clone());
    assert_eq!(buffer.recover_stale().await.unwrap(), 1);

    let store = Arc::new(FakeStore::default());
    let report = service(&db, store.clone()).run_once().await.unwrap();
    assert_eq!(report.chats_created, 1);
    assert_eq!(report.messages_synced, 3);
    assert_eq!(report.sessions_completed, 1);

    let chat = store.get("chats", "chat-1").unwrap();
    assert_eq!(chat["user_id"], "user-1");
    assert_eq!(chat["title"], "a good phone");
    assert_eq!(store.ids("messages").len(), 3);

    let session = buffer.session("chat-1").await.unwrap().unwrap();
    assert_eq!(session.status, SyncStatus::Synced);
    assert!(
        buffer
            .messages("chat-1")
            .await
            .unwrap()
            .iter()
            .all(|m| m.status == SyncStatus::Synced)
    );
}

#[tokio::test]
async fn replaying_a_pass_is_a_no_op() {
    let db = Database::open_in_memory().await.unwrap();
    let buffer = SessionBuffer::new(db.clone());
    buffer.open("c", "u", None, &[]).await.unwrap();
    buffer.append("c", MessageRole::Human, "hi", Value::Null).await.unwrap();
    buffer.close("c").await.unwrap();

    let store = Arc::new(FakeStore::default());
    let sync = service(&db, store.clone());
    sync.run_once().await.unwrap();
    let creates_after_first = store.creates.lock().unwrap().len();

    let again = sync.run_once().await.unwrap();
    assert_eq!(again.sessions_visited, 0);
    assert_eq!(again.messages_synced, 0);
    assert_eq!(store.creates.lock().unwrap().len(), creates_after_first);
}

#[tokio::test]
async fn live_session_messages_sync_without_completing_session() {
    let db = Database::open_in_memory().await.unwrap();
    let buffer = SessionBuffer::new(db.clone());
    buffer.open("c", "u", None, &[]).await.unwrap();
    buffer.append("c", MessageRole::Human, "hi", Value::Null).await.unwrap();

    let store = Arc::new(FakeStore::default());
    let sync = service(&db, store.clone());
    let report = sync.run_once().await.unwrap();
    assert_eq!(report.messages_synced, 1);
    assert_eq!(report.sessions_completed, 0);
    assert_eq!(
        buffer.session("c").await.unwrap().unwrap().status,
        SyncStatus::Active
    );

    // Closing later pushes the end time to the existing chat.
    buffer.close("c").await.unwrap();
    let report = sync.run_once().await.unwrap();
    assert_eq!(report.chats_updated, 1);
    assert_eq!(report.sessions_completed, 1);
    assert!(store.get("chats", "c").unwrap()["end_time"].is_string());
}

#[tokio::test]
async fn failures_are_marked_and_retried() {
    let db = Database::open_in_memory().await.unwrap();
    let buffer = SessionBuffer::new(db.clone());
    buffer.open("c", "u", None, &[]).await.unwrap();
    buffer.append("c", MessageRole::Human, "one", Value::Null).await.unwrap();
    buffer.append("c", MessageRole::Assistant, "two", Value::Null).await.unwrap();
    buffer.close("c").await.unwrap();

    let store = Arc::new(FakeStore::default());
    store.fail_messages.store(true, Ordering::SeqCst);
    let sync = service(&db, store.clone());

    let report = sync.run_once().await.unwrap();
    assert_eq!(report.messages_failed, 1);
    assert_eq!(report.messages_synced, 0);
    let session = buffer.session("c").await.unwrap().unwrap();
    assert_eq!(session.status, SyncStatus::SyncFailed);
    let messages = buffer.messages("c").await.unwrap();
    assert_eq!(messages[0].status, SyncStatus::SyncFailed);
    // The second message was not attempted ahead of the first.
    assert_eq!(messages[1].status, SyncStatus::Pending);

    store.fail_messages.store(false, Ordering::SeqCst);
    let report = sync.run_once().await.unwrap();
    assert_eq!(report.messages_synced, 2);
    assert_eq!(report.sessions_completed, 1);
    assert_eq!(
        buffer.session("c").await.unwrap().unwrap().status,
        SyncStatus::Synced
    );
}

#[tokio::test]
async fn run_loop_stops_on_cancel() {
    let db = Database::open_in_memory().await.unwrap();
    let store = Arc::new(FakeStore::default());
    let sync = Arc::new(service(&db, store));
    let cancel = CancellationToken::new();
    let handle = sync.spawn(cancel.clone());

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    cancel.cancel();
    handle.await.unwrap();
}
