//! services/tracker/src/adapters/firebase.rs
//!
//! A `DocumentStore` backed by a Firebase Realtime Database, reached through its
//! REST interface with `reqwest`. Live subscriptions use the database's
//! server-sent event stream, parsed with `eventsource-stream`: the adapter keeps
//! its own copy of the collection, applies every `put`/`patch` event to it and
//! emits the whole copy after each change.

use async_trait::async_trait;
use employee_tracker_core::domain::Collection;
use employee_tracker_core::ports::{Document, DocumentStore, PortError, PortResult, SnapshotStream};
use eventsource_stream::Eventsource;
use futures::stream::{self, StreamExt};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A document store adapter for the Firebase Realtime Database REST API.
#[derive(Clone)]
pub struct FirebaseStore {
    client: reqwest::Client,
    base_url: String,
    auth: Option<String>,
}

impl FirebaseStore {
    /// Creates a new `FirebaseStore` rooted at `base_url` (no trailing slash).
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, auth: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            auth,
        }
    }

    fn url(&self, collection: Collection, key: Option<&str>) -> String {
        match key {
            Some(key) => format!("{}/{}/{}.json", self.base_url, collection, key),
            None => format!("{}/{}.json", self.base_url, collection),
        }
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.auth {
            Some(token) => builder.query(&[("auth", token)]),
            None => builder,
        }
    }
}

fn remote(e: reqwest::Error) -> PortError {
    PortError::Remote(e.to_string())
}

//=========================================================================================
// Event Stream Handling
//=========================================================================================

/// The payload of a `put` or `patch` event.
#[derive(Debug, Deserialize)]
struct EventPayload {
    path: String,
    data: Value,
}

/// What an event did to the local copy of the collection.
#[derive(Debug, PartialEq, Eq)]
pub enum Applied {
    Changed,
    Unchanged,
}

/// Applies one server-sent event to `tree`.
///
/// `put` replaces the node at `path`, `patch` merges children into it, and a
/// `null` value removes a node. `cancel` and `auth_revoked` end the
/// subscription.
pub fn apply_event(tree: &mut Value, event: &str, data: &str) -> PortResult<Applied> {
    match event {
        "put" => {
            let payload = parse_payload(data)?;
            set_at_path(tree, &segments(&payload.path), payload.data);
            Ok(Applied::Changed)
        }
        "patch" => {
            let payload = parse_payload(data)?;
            let Value::Object(children) = payload.data else {
                return Err(PortError::Remote(format!("patch at {} is not an object", payload.path)));
            };
            let base = segments(&payload.path);
            for (key, value) in children {
                let mut path = base.clone();
                path.push(key.as_str());
                set_at_path(tree, &path, value);
            }
            Ok(Applied::Changed)
        }
        "keep-alive" => Ok(Applied::Unchanged),
        "cancel" => Err(PortError::SubscriptionCancelled(data.to_string())),
        "auth_revoked" => Err(PortError::SubscriptionCancelled("credential is no longer valid".to_string())),
        other => {
            debug!(event = other, "ignoring unknown stream event");
            Ok(Applied::Unchanged)
        }
    }
}

fn parse_payload(data: &str) -> PortResult<EventPayload> {
    serde_json::from_str(data).map_err(|e| PortError::Remote(format!("malformed stream event: {e}")))
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn set_at_path(node: &mut Value, path: &[&str], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = value;
        return;
    };
    if value.is_null() && !node.is_object() {
        return;
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }

    let emptied = match node {
        Value::Object(children) => {
            let child = children.entry(head.to_string()).or_insert(Value::Null);
            set_at_path(child, rest, value);
            if child.is_null() {
                children.remove(*head);
            }
            children.is_empty()
        }
        _ => false,
    };
    if emptied {
        *node = Value::Null;
    }
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for FirebaseStore {
    /// Push ids are not numeric, so new records take timestamp ids.
    fn next_key(&self, _collection: Collection) -> Option<String> {
        None
    }

    async fn set(&self, collection: Collection, key: &str, document: Document) -> PortResult<()> {
        self.request(reqwest::Method::PUT, self.url(collection, Some(key)))
            .json(&document)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(remote)?;
        Ok(())
    }

    async fn remove(&self, collection: Collection, key: &str) -> PortResult<()> {
        self.request(reqwest::Method::DELETE, self.url(collection, Some(key)))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(remote)?;
        Ok(())
    }

    async fn fetch(&self, collection: Collection) -> PortResult<Value> {
        let response = self
            .request(reqwest::Method::GET, self.url(collection, None))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(remote)?;
        response.json::<Value>().await.map_err(remote)
    }

    async fn watch(&self, collection: Collection) -> PortResult<SnapshotStream> {
        let response = self
            .request(reqwest::Method::GET, self.url(collection, None))
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(remote)?;

        let events = response.bytes_stream().eventsource().boxed();
        let snapshots = stream::unfold(Some((events, Value::Null)), move |state| async move {
            let (mut events, mut tree) = state?;
            loop {
                let event = match events.next().await {
                    Some(Ok(event)) => event,
                    Some(Err(e)) => {
                        error!(%collection, error = %e, "event stream failed");
                        return Some((Err(PortError::Remote(e.to_string())), None));
                    }
                    None => {
                        warn!(%collection, "event stream closed by server");
                        let closed = PortError::SubscriptionCancelled(format!("stream for {collection} closed"));
                        return Some((Err(closed), None));
                    }
                };
                match apply_event(&mut tree, &event.event, &event.data) {
                    Ok(Applied::Changed) => return Some((Ok(tree.clone()), Some((events, tree)))),
                    Ok(Applied::Unchanged) => continue,
                    Err(e) => {
                        warn!(%collection, error = %e, "subscription ended by server");
                        return Some((Err(e), None));
                    }
                }
            }
        });
        Ok(snapshots.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn urls_follow_the_collection_layout() {
        let store = FirebaseStore::new(reqwest::Client::new(), "https://db.example.com", None);
        assert_eq!(store.url(Collection::Tasks, None), "https://db.example.com/tasks.json");
        assert_eq!(
            store.url(Collection::Attendance, Some("42")),
            "https://db.example.com/attendance/42.json"
        );
    }

    #[test]
    fn initial_put_replaces_the_tree() {
        let mut tree = Value::Null;
        let data = r#"{"path":"/","data":{"1":{"title":"a"}}}"#;
        assert_eq!(apply_event(&mut tree, "put", data).unwrap(), Applied::Changed);
        assert_eq!(tree, json!({"1": {"title": "a"}}));
    }

    #[test]
    fn put_at_a_child_path_replaces_only_that_child() {
        let mut tree = json!({"1": {"title": "a", "status": "Pending"}, "2": {"title": "b"}});
        apply_event(&mut tree, "put", r#"{"path":"/1","data":{"title":"c"}}"#).unwrap();
        assert_eq!(tree, json!({"1": {"title": "c"}, "2": {"title": "b"}}));
    }

    #[test]
    fn patch_merges_children() {
        let mut tree = json!({"1": {"title": "a", "status": "Pending"}});
        apply_event(&mut tree, "patch", r#"{"path":"/1","data":{"status":"Done"}}"#).unwrap();
        assert_eq!(tree, json!({"1": {"title": "a", "status": "Done"}}));
    }

    #[test]
    fn null_removes_and_empty_collections_become_null() {
        let mut tree = json!({"1": {"title": "a"}});
        apply_event(&mut tree, "put", r#"{"path":"/1","data":null}"#).unwrap();
        assert_eq!(tree, Value::Null);
    }

    #[test]
    fn keep_alive_changes_nothing() {
        let mut tree = json!({"1": {}});
        assert_eq!(apply_event(&mut tree, "keep-alive", "null").unwrap(), Applied::Unchanged);
    }

    #[test]
    fn cancel_and_revoked_auth_end_the_subscription() {
        let mut tree = Value::Null;
        assert!(matches!(
            apply_event(&mut tree, "cancel", "permission denied"),
            Err(PortError::SubscriptionCancelled(_))
        ));
        assert!(matches!(
            apply_event(&mut tree, "auth_revoked", "credential is no longer valid"),
            Err(PortError::SubscriptionCancelled(_))
        ));
    }

    #[test]
    fn malformed_payload_is_a_remote_error() {
        let mut tree = Value::Null;
        assert!(matches!(apply_event(&mut tree, "put", "not json"), Err(PortError::Remote(_))));
    }
}
