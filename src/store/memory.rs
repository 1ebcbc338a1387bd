//! In-memory [`DocumentStore`] implementation.
//!
//! Backs the demo binary and the test suite. Collections are ordered maps so
//! query results are deterministic.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Document, DocumentStore, StoreError, MAX_BATCH};

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

fn check_batch(len: usize) -> Result<(), StoreError> {
    if len > MAX_BATCH {
        return Err(StoreError::BatchTooLarge {
            got: len,
            limit: MAX_BATCH,
        });
    }
    Ok(())
}

/// `a <= b` for the value shapes the core stores: numbers numerically,
/// everything else through string comparison (RFC 3339 timestamps compare
/// correctly this way).
fn value_lte(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x <= y,
        _ => match (a.as_str(), b.as_str()) {
            (Some(x), Some(y)) => x <= y,
            _ => false,
        },
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        let mut guard = self.collections.write().await;
        let doc = guard
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        if let (Some(target), Some(fields)) = (doc.as_object_mut(), patch.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        let guard = self.collections.read().await;
        let mut out = Vec::new();
        if let Some(docs) = guard.get(collection) {
            for (id, data) in docs {
                if data.get(field) == Some(value) {
                    out.push(Document::new(id.clone(), data.clone()));
                    if limit.is_some_and(|l| out.len() >= l) {
                        break;
                    }
                }
            }
        }
        Ok(out)
    }

    async fn query_lte(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        let guard = self.collections.read().await;
        let mut out = Vec::new();
        if let Some(docs) = guard.get(collection) {
            for (id, data) in docs {
                if data.get(field).is_some_and(|v| value_lte(v, value)) {
                    out.push(Document::new(id.clone(), data.clone()));
                    if limit.is_some_and(|l| out.len() >= l) {
                        break;
                    }
                }
            }
        }
        Ok(out)
    }

    async fn batch_write(&self, collection: &str, docs: Vec<Document>) -> Result<(), StoreError> {
        check_batch(docs.len())?;
        let mut guard = self.collections.write().await;
        let target = guard.entry(collection.to_string()).or_default();
        for doc in docs {
            target.insert(doc.id, doc.data);
        }
        Ok(())
    }

    async fn batch_delete(&self, collection: &str, ids: Vec<String>) -> Result<(), StoreError> {
        check_batch(ids.len())?;
        let mut guard = self.collections.write().await;
        if let Some(target) = guard.get_mut(collection) {
            for id in ids {
                target.remove(&id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = MemoryStore::new();
        store
            .set("channels", "c1", json!({"name": "CNN"}))
            .await
            .unwrap();

        let doc = store.get("channels", "c1").await.unwrap().unwrap();
        assert_eq!(doc["name"], "CNN");
        assert!(store.get("channels", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::new();
        store
            .set("playlists", "p1", json!({"parsing": true, "name": "mine"}))
            .await
            .unwrap();
        store
            .update("playlists", "p1", json!({"parsing": false}))
            .await
            .unwrap();

        let doc = store.get("playlists", "p1").await.unwrap().unwrap();
        assert_eq!(doc["parsing"], false);
        assert_eq!(doc["name"], "mine");
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update("playlists", "nope", json!({"parsing": false}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_query_eq_respects_limit() {
        let store = MemoryStore::new();
        for i in 0..10 {
            store
                .set("channels", &format!("c{i:02}"), json!({"playlistId": "p1"}))
                .await
                .unwrap();
        }

        let page = store
            .query_eq("channels", "playlistId", &json!("p1"), Some(4))
            .await
            .unwrap();
        assert_eq!(page.len(), 4);

        let all = store
            .query_eq("channels", "playlistId", &json!("p1"), None)
            .await
            .unwrap();
        assert_eq!(all.len(), 10);
    }

    #[tokio::test]
    async fn test_query_lte_on_timestamps() {
        let store = MemoryStore::new();
        store
            .set("programs", "a", json!({"end": "2026-01-01T00:00:00Z"}))
            .await
            .unwrap();
        store
            .set("programs", "b", json!({"end": "2026-06-01T00:00:00Z"}))
            .await
            .unwrap();

        let hits = store
            .query_lte("programs", "end", &json!("2026-03-01T00:00:00Z"), None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn test_batch_limits_enforced() {
        let store = MemoryStore::new();
        let docs: Vec<Document> = (0..MAX_BATCH + 1)
            .map(|i| Document::new(format!("d{i}"), json!({})))
            .collect();
        let err = store.batch_write("channels", docs).await.unwrap_err();
        assert!(matches!(err, StoreError::BatchTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_batch_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.set("channels", "c1", json!({})).await.unwrap();
        store
            .batch_delete("channels", vec!["c1".into(), "ghost".into()])
            .await
            .unwrap();
        assert_eq!(store.count("channels").await, 0);
    }
}
