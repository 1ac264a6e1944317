//! crates/employee_tracker_core/src/live.rs
//!
//! Live queries over the local cache: run once, then re-run whenever the
//! watched table reports a write.

use crate::domain::Collection;
use crate::ports::{LocalCache, PortResult, RecordStream};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

/// A re-runnable query against the cache.
pub type CacheQuery<T> = Arc<dyn Fn(Arc<dyn LocalCache>) -> BoxFuture<'static, PortResult<Vec<T>>> + Send + Sync>;

/// Emits the result of `query` immediately and again after each change to `table`.
///
/// A receiver that lagged behind re-runs the query once; the stream ends when
/// the cache's change channel closes.
pub fn live_query<T, F>(cache: Arc<dyn LocalCache>, table: Collection, query: F) -> RecordStream<T>
where
    T: Send + 'static,
    F: Fn(Arc<dyn LocalCache>) -> BoxFuture<'static, PortResult<Vec<T>>> + Send + Sync + 'static,
{
    let changes = cache.changes();
    let query: CacheQuery<T> = Arc::new(query);

    stream::unfold(
        (cache, changes, query, true),
        move |(cache, mut changes, query, first)| async move {
            if !first && !wait_for(&mut changes, table).await {
                debug!(%table, "change channel closed, ending live query");
                return None;
            }
            let result = query(cache.clone()).await;
            Some((result, (cache, changes, query, false)))
        },
    )
    .boxed()
}

/// Waits for the next write to `table`. Returns `false` once the channel is closed.
async fn wait_for(changes: &mut broadcast::Receiver<Collection>, table: Collection) -> bool {
    loop {
        match changes.recv().await {
            Ok(changed) if changed == table => return true,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                debug!(%table, skipped, "live query lagged");
                return true;
            }
            Err(RecvError::Closed) => return false,
        }
    }
}
