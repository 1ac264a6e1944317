//! services/tracker/src/adapters/memory.rs
//!
//! An in-process `DocumentStore`: one JSON subtree per collection, each held in
//! a `watch` channel so every subscriber sees the whole collection after each
//! write. It can be taken offline to exercise the local-cache fallback.

use async_trait::async_trait;
use chrono::Utc;
use employee_tracker_core::domain::Collection;
use employee_tracker_core::ports::{Document, DocumentStore, PortError, PortResult, SnapshotStream};
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A document store kept entirely in memory.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    trees: HashMap<Collection, watch::Sender<Value>>,
    sequence: AtomicI64,
    online: AtomicBool,
    listeners: Mutex<CancellationToken>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let trees = Collection::ALL
            .into_iter()
            .map(|collection| (collection, watch::channel(Value::Null).0))
            .collect();
        Self {
            inner: Arc::new(Inner {
                trees,
                // Keys start at the current epoch millis so they never collide
                // with the small ids a fresh local cache hands out.
                sequence: AtomicI64::new(Utc::now().timestamp_millis()),
                online: AtomicBool::new(true),
                listeners: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    /// Cancels every live subscription and fails all further calls until `reconnect`.
    pub fn disconnect(&self) {
        self.inner.online.store(false, Ordering::SeqCst);
        if let Ok(token) = self.inner.listeners.lock() {
            token.cancel();
        }
        info!("memory store disconnected");
    }

    pub fn reconnect(&self) {
        if let Ok(mut token) = self.inner.listeners.lock() {
            *token = CancellationToken::new();
        }
        self.inner.online.store(true, Ordering::SeqCst);
        info!("memory store reconnected");
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Writes `value` at `<collection>/<key>` without any shape checks.
    pub fn put_raw(&self, collection: Collection, key: &str, value: Value) {
        self.tree(collection).send_modify(|tree| match tree {
            Value::Object(children) => {
                children.insert(key.to_string(), value);
            }
            _ => {
                let mut children = Map::new();
                children.insert(key.to_string(), value);
                *tree = Value::Object(children);
            }
        });
    }

    fn tree(&self, collection: Collection) -> &watch::Sender<Value> {
        // Every collection gets a channel in `new`.
        &self.inner.trees[&collection]
    }

    fn ensure_online(&self) -> PortResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(PortError::Remote("memory store is offline".to_string()))
        }
    }

    fn listener_token(&self) -> PortResult<CancellationToken> {
        self.inner
            .listeners
            .lock()
            .map(|token| token.clone())
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for MemoryStore {
    fn next_key(&self, _collection: Collection) -> Option<String> {
        let key = self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        Some(key.to_string())
    }

    async fn set(&self, collection: Collection, key: &str, document: Document) -> PortResult<()> {
        self.ensure_online()?;
        self.put_raw(collection, key, Value::Object(document));
        debug!(%collection, key, "document set");
        Ok(())
    }

    async fn remove(&self, collection: Collection, key: &str) -> PortResult<()> {
        self.ensure_online()?;
        self.tree(collection).send_modify(|tree| {
            if let Value::Object(children) = tree {
                children.remove(key);
                if children.is_empty() {
                    *tree = Value::Null;
                }
            }
        });
        debug!(%collection, key, "document removed");
        Ok(())
    }

    async fn fetch(&self, collection: Collection) -> PortResult<Value> {
        self.ensure_online()?;
        Ok(self.tree(collection).borrow().clone())
    }

    async fn watch(&self, collection: Collection) -> PortResult<SnapshotStream> {
        self.ensure_online()?;
        let token = self.listener_token()?;
        let receiver = self.tree(collection).subscribe();

        // The first emission is the current tree; later ones follow each write.
        let snapshots = stream::unfold(Some((receiver, token, true)), move |state| async move {
            let (mut receiver, token, first) = state?;
            if !first {
                let cancelled = tokio::select! {
                    biased;
                    _ = token.cancelled() => true,
                    changed = receiver.changed() => {
                        if changed.is_err() {
                            return None;
                        }
                        false
                    }
                };
                if cancelled {
                    let error = PortError::SubscriptionCancelled(format!("listener on {collection} was cancelled"));
                    return Some((Err(error), None));
                }
            }
            let tree = receiver.borrow_and_update().clone();
            Some((Ok(tree), Some((receiver, token, false))))
        });
        Ok(snapshots.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn watch_emits_the_whole_collection_on_every_change() {
        let store = MemoryStore::new();
        store.set(Collection::Tasks, "1", doc(json!({"title": "a"}))).await.unwrap();

        let mut snapshots = store.watch(Collection::Tasks).await.unwrap();
        assert_eq!(snapshots.next().await.unwrap().unwrap(), json!({"1": {"title": "a"}}));

        store.set(Collection::Tasks, "2", doc(json!({"title": "b"}))).await.unwrap();
        let tree = snapshots.next().await.unwrap().unwrap();
        assert_eq!(tree.as_object().unwrap().len(), 2);

        store.remove(Collection::Tasks, "1").await.unwrap();
        store.remove(Collection::Tasks, "2").await.unwrap();
        assert_eq!(store.fetch(Collection::Tasks).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn disconnect_cancels_listeners_and_fails_calls() {
        let store = MemoryStore::new();
        let mut snapshots = store.watch(Collection::Users).await.unwrap();
        assert_eq!(snapshots.next().await.unwrap().unwrap(), Value::Null);

        store.disconnect();
        assert!(matches!(snapshots.next().await, Some(Err(PortError::SubscriptionCancelled(_)))));
        assert!(snapshots.next().await.is_none());
        assert!(matches!(
            store.set(Collection::Users, "1", Document::new()).await,
            Err(PortError::Remote(_))
        ));
        assert!(store.watch(Collection::Users).await.is_err());

        store.reconnect();
        assert!(store.fetch(Collection::Users).await.is_ok());
    }

    #[test]
    fn keys_are_numeric_and_increasing() {
        let store = MemoryStore::new();
        let first: i64 = store.next_key(Collection::Tasks).unwrap().parse().unwrap();
        let second: i64 = store.next_key(Collection::Reviews).unwrap().parse().unwrap();
        assert!(second > first);
    }
}
