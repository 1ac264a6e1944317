//! crates/employee_tracker_core/src/sync.rs
//!
//! The mirroring policy between the remote tree and the local cache.
//!
//! A feed opens the remote subscription, publishes every snapshot and writes
//! each of its records into the cache. If the subscription cannot be opened,
//! or fails later, the feed switches to the cache's live query for the rest of
//! its life. Writes go to the remote tree first and land in the cache only when
//! the remote write fails; those local-only writes are never pushed back.

use crate::domain::{Attendance, Collection, EntityId, Message, Review, Task, User};
use crate::ports::{LocalCache, PortError, PortResult, RecordStream};
use crate::records::RemoteRecord;
use crate::remote::RemoteRepository;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

//=========================================================================================
// CachedRecord
//=========================================================================================

/// A remote record that also has a table in the local cache.
#[async_trait]
pub trait CachedRecord: RemoteRecord {
    /// Upserts the record, returning the stored id.
    async fn upsert_into(&self, cache: &dyn LocalCache) -> PortResult<EntityId>;

    async fn delete_from(cache: &dyn LocalCache, id: EntityId) -> PortResult<()>;
}

#[async_trait]
impl CachedRecord for User {
    async fn upsert_into(&self, cache: &dyn LocalCache) -> PortResult<EntityId> {
        cache.upsert_user(self).await
    }

    async fn delete_from(cache: &dyn LocalCache, id: EntityId) -> PortResult<()> {
        cache.delete_user(id).await
    }
}

#[async_trait]
impl CachedRecord for Task {
    async fn upsert_into(&self, cache: &dyn LocalCache) -> PortResult<EntityId> {
        cache.upsert_task(self).await
    }

    async fn delete_from(cache: &dyn LocalCache, id: EntityId) -> PortResult<()> {
        cache.delete_task(id).await
    }
}

#[async_trait]
impl CachedRecord for Review {
    async fn upsert_into(&self, cache: &dyn LocalCache) -> PortResult<EntityId> {
        cache.upsert_review(self).await
    }

    async fn delete_from(cache: &dyn LocalCache, id: EntityId) -> PortResult<()> {
        cache.delete_review(id).await
    }
}

#[async_trait]
impl CachedRecord for Message {
    async fn upsert_into(&self, cache: &dyn LocalCache) -> PortResult<EntityId> {
        cache.upsert_message(self).await
    }

    async fn delete_from(cache: &dyn LocalCache, id: EntityId) -> PortResult<()> {
        cache.delete_message(id).await
    }
}

#[async_trait]
impl CachedRecord for Attendance {
    async fn upsert_into(&self, cache: &dyn LocalCache) -> PortResult<EntityId> {
        cache.upsert_attendance(self).await
    }

    async fn delete_from(cache: &dyn LocalCache, id: EntityId) -> PortResult<()> {
        cache.delete_attendance(id).await
    }
}

//=========================================================================================
// Feeds
//=========================================================================================

/// Where the records currently published by a feed came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
    /// No snapshot has arrived yet.
    Connecting,
    Remote,
    Local,
}

/// The observable state of one feed.
#[derive(Debug, Clone)]
pub struct FeedState<T> {
    pub records: Arc<Vec<T>>,
    pub source: FeedSource,
    /// The remote failure that forced the switch to the cache, if any.
    pub last_error: Option<String>,
}

impl<T> FeedState<T> {
    fn connecting() -> Self {
        Self {
            records: Arc::new(Vec::new()),
            source: FeedSource::Connecting,
            last_error: None,
        }
    }
}

/// Builds the cache-side fallback stream for a feed.
pub type LocalFallback<T> = Box<dyn FnOnce(Arc<dyn LocalCache>) -> RecordStream<T> + Send>;

/// A running subscription. Dropping or closing it stops the background task.
pub struct Feed<T> {
    state: watch::Receiver<FeedState<T>>,
    token: CancellationToken,
}

impl<T: Clone> Feed<T> {
    /// A copy of the most recently published state.
    pub fn snapshot(&self) -> FeedState<T> {
        self.state.borrow().clone()
    }

    /// The most recently published records.
    pub fn records(&self) -> Arc<Vec<T>> {
        self.state.borrow().records.clone()
    }

    pub fn source(&self) -> FeedSource {
        self.state.borrow().source
    }

    /// An independent receiver for observers that want to await changes.
    pub fn subscribe(&self) -> watch::Receiver<FeedState<T>> {
        self.state.clone()
    }

    /// Waits for the next published state. Returns `false` once the feed has stopped.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// Cancels the background subscription.
    pub fn close(&self) {
        self.token.cancel();
    }
}

impl<T> Drop for Feed<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Starts a feed for `T`.
///
/// `remote` opens the remote subscription; `fallback` builds the cache's live
/// query and is only invoked once the remote side has failed.
pub fn spawn_feed<T: CachedRecord>(
    label: &'static str,
    remote: BoxFuture<'static, PortResult<RecordStream<T>>>,
    cache: Arc<dyn LocalCache>,
    fallback: LocalFallback<T>,
) -> Feed<T> {
    let (tx, rx) = watch::channel(FeedState::connecting());
    let token = CancellationToken::new();
    let task_token = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = task_token.cancelled() => debug!(feed = label, "feed cancelled"),
            _ = run_feed(label, remote, cache, fallback, tx) => debug!(feed = label, "feed finished"),
        }
    });

    Feed { state: rx, token }
}

async fn run_feed<T: CachedRecord>(
    label: &'static str,
    remote: BoxFuture<'static, PortResult<RecordStream<T>>>,
    cache: Arc<dyn LocalCache>,
    fallback: LocalFallback<T>,
    tx: watch::Sender<FeedState<T>>,
) {
    let failure = match remote.await {
        Ok(snapshots) => follow_remote(label, snapshots, cache.as_ref(), &tx).await,
        Err(e) => Some(e),
    };

    let Some(failure) = failure else {
        debug!(feed = label, "remote subscription ended");
        return;
    };

    warn!(feed = label, error = %failure, "remote feed unavailable, serving from local cache");
    let cause = failure.to_string();
    let mut local = fallback(cache);
    while let Some(item) = local.next().await {
        match item {
            Ok(records) => {
                tx.send_replace(FeedState {
                    records: Arc::new(records),
                    source: FeedSource::Local,
                    last_error: Some(cause.clone()),
                });
            }
            Err(e) => {
                error!(feed = label, error = %e, "local live query failed");
                tx.send_modify(|state| state.last_error = Some(e.to_string()));
                break;
            }
        }
    }
}

/// Publishes and mirrors remote snapshots until the stream fails or ends.
///
/// Records the cache rejected (typically because their owner has not been
/// mirrored yet) are retried whenever the users table changes, until the next
/// snapshot replaces them.
async fn follow_remote<T: CachedRecord>(
    label: &'static str,
    mut snapshots: RecordStream<T>,
    cache: &dyn LocalCache,
    tx: &watch::Sender<FeedState<T>>,
) -> Option<PortError> {
    let mut users_changed = cache.changes();
    let mut rejected: Vec<T> = Vec::new();
    loop {
        tokio::select! {
            item = snapshots.next() => match item {
                Some(Ok(records)) => {
                    let records = Arc::new(records);
                    tx.send_replace(FeedState {
                        records: records.clone(),
                        source: FeedSource::Remote,
                        last_error: None,
                    });
                    rejected = mirror(label, cache, records.iter()).await;
                }
                Some(Err(e)) => return Some(e),
                None => return None,
            },
            changed = users_changed.recv(), if !rejected.is_empty() => match changed {
                Ok(Collection::Users) | Err(RecvError::Lagged(_)) => {
                    debug!(feed = label, pending = rejected.len(), "users changed, retrying rejected records");
                    let pending = std::mem::take(&mut rejected);
                    rejected = mirror(label, cache, pending.iter()).await;
                }
                Ok(_) => {}
                Err(RecvError::Closed) => rejected.clear(),
            },
        }
    }
}

/// Writes every record into the cache. Failures are logged per record; the
/// ones the cache refused are returned for a later retry (never for users).
async fn mirror<'a, T: CachedRecord + 'a>(
    label: &'static str,
    cache: &dyn LocalCache,
    records: impl Iterator<Item = &'a T>,
) -> Vec<T> {
    let mut rejected = Vec::new();
    for record in records {
        match record.upsert_into(cache).await {
            Ok(_) => {}
            Err(PortError::Storage(e)) if T::COLLECTION != Collection::Users => {
                debug!(feed = label, id = record.id(), error = %e, "cache rejected record, will retry");
                rejected.push(record.clone());
            }
            Err(e) => {
                warn!(feed = label, id = record.id(), error = %e, "failed to mirror record into local cache");
            }
        }
    }
    rejected
}

//=========================================================================================
// Writes
//=========================================================================================

/// Result of a write that may have been diverted to the local cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum WriteOutcome<T> {
    /// Accepted by the remote tree; the cache will follow via the feed.
    Remote { record: T },
    /// The remote write failed; only the local cache holds this change.
    LocalOnly { record: T, cause: String },
}

impl<T> WriteOutcome<T> {
    pub fn record(&self) -> &T {
        match self {
            WriteOutcome::Remote { record } | WriteOutcome::LocalOnly { record, .. } => record,
        }
    }

    pub fn into_record(self) -> T {
        match self {
            WriteOutcome::Remote { record } | WriteOutcome::LocalOnly { record, .. } => record,
        }
    }

    pub fn is_local_only(&self) -> bool {
        matches!(self, WriteOutcome::LocalOnly { .. })
    }
}

/// Remote-first writer shared by the family services.
#[derive(Clone)]
pub struct WriteThrough {
    pub(crate) remote: RemoteRepository,
    pub(crate) cache: Arc<dyn LocalCache>,
}

impl WriteThrough {
    pub fn new(remote: RemoteRepository, cache: Arc<dyn LocalCache>) -> Self {
        Self { remote, cache }
    }

    pub async fn add<T: CachedRecord>(&self, record: T) -> PortResult<WriteOutcome<T>> {
        match self.remote.add(record.clone()).await {
            Ok(saved) => Ok(WriteOutcome::Remote { record: saved }),
            Err(e) => self.store_locally(record, e).await,
        }
    }

    pub async fn update<T: CachedRecord>(&self, record: T) -> PortResult<WriteOutcome<T>> {
        if record.id() == 0 {
            return Err(PortError::InvalidInput(format!(
                "cannot update a {} record without an id",
                T::COLLECTION
            )));
        }
        match self.remote.update(&record).await {
            Ok(()) => Ok(WriteOutcome::Remote { record }),
            Err(e) => self.store_locally(record, e).await,
        }
    }

    pub async fn delete<T: CachedRecord>(&self, id: EntityId) -> PortResult<WriteOutcome<EntityId>> {
        match self.remote.delete::<T>(id).await {
            Ok(()) => Ok(WriteOutcome::Remote { record: id }),
            Err(e) => {
                warn!(collection = %T::COLLECTION, id, error = %e, "remote delete failed, deleting locally");
                T::delete_from(self.cache.as_ref(), id).await?;
                Ok(WriteOutcome::LocalOnly {
                    record: id,
                    cause: e.to_string(),
                })
            }
        }
    }

    async fn store_locally<T: CachedRecord>(&self, record: T, cause: PortError) -> PortResult<WriteOutcome<T>> {
        warn!(collection = %T::COLLECTION, error = %cause, "remote write failed, writing to local cache only");
        let id = record.upsert_into(self.cache.as_ref()).await?;
        Ok(WriteOutcome::LocalOnly {
            record: record.with_id(id),
            cause: cause.to_string(),
        })
    }
}
