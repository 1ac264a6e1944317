//! crates/employee_tracker_core/src/remote.rs
//!
//! The typed accessor over a `DocumentStore`: keyed create/replace/delete of
//! whole records, and live subscriptions that re-parse the entire collection
//! on every change.

use crate::domain::{EntityId, User};
use crate::ports::{DocumentStore, PortResult, RecordStream};
use crate::records::{parse_snapshot, RemoteRecord};
use chrono::Utc;
use futures::StreamExt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Typed CRUD and live reads against the remote document tree.
#[derive(Clone)]
pub struct RemoteRepository {
    store: Arc<dyn DocumentStore>,
    last_stamp: Arc<AtomicI64>,
}

impl RemoteRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            last_stamp: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Picks the id for a new record: the store's key when it is numeric,
    /// otherwise the current epoch milliseconds.
    fn allocate_id<T: RemoteRecord>(&self) -> EntityId {
        self.store
            .next_key(T::COLLECTION)
            .and_then(|key| key.parse::<EntityId>().ok())
            .unwrap_or_else(|| self.timestamp_id())
    }

    /// Epoch milliseconds, bumped past the last one handed out so that two
    /// creates within the same millisecond get distinct ids.
    fn timestamp_id(&self) -> EntityId {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or(now);
        now.max(previous + 1)
    }

    /// Creates `record` at `<collection>/<id>`. A record with id `0` gets a fresh id.
    pub async fn add<T: RemoteRecord>(&self, record: T) -> PortResult<T> {
        let record = match record.id() {
            0 => {
                let id = self.allocate_id::<T>();
                record.with_id(id)
            }
            _ => record,
        };
        self.put(&record).await?;
        debug!(collection = %T::COLLECTION, id = record.id(), "record added");
        Ok(record)
    }

    /// Replaces the whole document at `<collection>/<id>`.
    pub async fn update<T: RemoteRecord>(&self, record: &T) -> PortResult<()> {
        self.put(record).await?;
        debug!(collection = %T::COLLECTION, id = record.id(), "record updated");
        Ok(())
    }

    async fn put<T: RemoteRecord>(&self, record: &T) -> PortResult<()> {
        let key = record.id().to_string();
        self.store
            .set(T::COLLECTION, &key, record.to_document())
            .await
            .inspect_err(|e| error!(collection = %T::COLLECTION, %key, error = %e, "remote write failed"))
    }

    /// Removes the subtree at `<collection>/<id>`.
    pub async fn delete<T: RemoteRecord>(&self, id: EntityId) -> PortResult<()> {
        let key = id.to_string();
        self.store
            .remove(T::COLLECTION, &key)
            .await
            .inspect_err(|e| error!(collection = %T::COLLECTION, %key, error = %e, "remote delete failed"))?;
        debug!(collection = %T::COLLECTION, id, "record deleted");
        Ok(())
    }

    /// Reads and parses the whole collection once.
    pub async fn fetch_all<T: RemoteRecord>(&self) -> PortResult<Vec<T>> {
        let tree = self
            .store
            .fetch(T::COLLECTION)
            .await
            .inspect_err(|e| error!(collection = %T::COLLECTION, error = %e, "remote read failed"))?;
        Ok(parse_snapshot(&tree))
    }

    /// Live feed of the whole collection.
    pub async fn watch<T: RemoteRecord>(&self) -> PortResult<RecordStream<T>> {
        self.watch_with(|records: Vec<T>| records).await
    }

    /// Live feed of the whole collection, passed through `shape` (a filter
    /// and/or sort) after every re-parse.
    pub async fn watch_with<T, F>(&self, shape: F) -> PortResult<RecordStream<T>>
    where
        T: RemoteRecord,
        F: Fn(Vec<T>) -> Vec<T> + Send + 'static,
    {
        let snapshots = self
            .store
            .watch(T::COLLECTION)
            .await
            .inspect_err(|e| error!(collection = %T::COLLECTION, error = %e, "remote subscription failed"))?;

        let records = snapshots.map(move |item| {
            item.inspect_err(|e| error!(collection = %T::COLLECTION, error = %e, "remote listener ended"))
                .map(|tree| shape(parse_snapshot::<T>(&tree)))
        });
        Ok(records.boxed())
    }

    /// Finds the user whose email and password both match.
    pub async fn login(&self, email: &str, password: &str) -> PortResult<Option<User>> {
        let users = self.fetch_all::<User>().await?;
        Ok(users.into_iter().find(|u| u.email == email && u.password == password))
    }
}
