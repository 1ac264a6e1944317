//! crates/employee_tracker_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! The two storage backends sit behind these traits: the remote real-time
//! document tree (`DocumentStore`) and the on-device relational cache
//! (`LocalCache`). Everything else in the core depends only on them.

use crate::domain::{Attendance, Collection, EntityId, Message, Review, Task, User};
use async_trait::async_trait;
use futures::Stream;
use serde_json::{Map, Value};
use std::pin::Pin;
use tokio::sync::broadcast;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Remote store error: {0}")]
    Remote(String),
    #[error("Subscription cancelled: {0}")]
    SubscriptionCancelled(String),
    #[error("Local storage error: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A flat key-value map: the shape of one record in the remote tree.
pub type Document = Map<String, Value>;

/// Live feed of whole-collection snapshots. Each item is the entire collection
/// node (`null` when the collection is empty).
pub type SnapshotStream = Pin<Box<dyn Stream<Item = PortResult<Value>> + Send>>;

/// Live feed of fully parsed record lists.
pub type RecordStream<T> = Pin<Box<dyn Stream<Item = PortResult<Vec<T>>> + Send>>;

//=========================================================================================
// Remote Document Store
//=========================================================================================

/// Keyed access to a hierarchical document tree with one subtree per collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Asks the store's key generator for a fresh child key, if it has one.
    fn next_key(&self, collection: Collection) -> Option<String>;

    /// Replaces the whole document at `<collection>/<key>`.
    async fn set(&self, collection: Collection, key: &str, document: Document) -> PortResult<()>;

    /// Removes the subtree at `<collection>/<key>`.
    async fn remove(&self, collection: Collection, key: &str) -> PortResult<()>;

    /// Reads the whole collection once.
    async fn fetch(&self, collection: Collection) -> PortResult<Value>;

    /// Attaches a listener that emits the whole collection now and after every change.
    /// A cancelled listener yields one `SubscriptionCancelled` error and then ends.
    async fn watch(&self, collection: Collection) -> PortResult<SnapshotStream>;
}

//=========================================================================================
// Local Relational Cache
//=========================================================================================

/// Typed table-per-entity storage used as the offline fallback.
///
/// Every `upsert_*` replaces all columns of an existing row with the same id;
/// an id of `0` allocates a new one. The returned id is the stored row's id.
#[async_trait]
pub trait LocalCache: Send + Sync {
    // --- Users ---
    async fn upsert_user(&self, user: &User) -> PortResult<EntityId>;

    async fn get_user(&self, id: EntityId) -> PortResult<Option<User>>;

    async fn find_user_by_credentials(&self, email: &str, password: &str) -> PortResult<Option<User>>;

    async fn list_users(&self) -> PortResult<Vec<User>>;

    async fn list_employees(&self) -> PortResult<Vec<User>>;

    async fn delete_user(&self, id: EntityId) -> PortResult<()>;

    async fn employee_count(&self) -> PortResult<i64>;

    // --- Tasks ---
    async fn upsert_task(&self, task: &Task) -> PortResult<EntityId>;

    async fn get_task(&self, id: EntityId) -> PortResult<Option<Task>>;

    async fn list_tasks(&self) -> PortResult<Vec<Task>>;

    async fn list_tasks_for_employee(&self, employee_id: EntityId) -> PortResult<Vec<Task>>;

    async fn delete_task(&self, id: EntityId) -> PortResult<()>;

    // --- Reviews ---
    async fn upsert_review(&self, review: &Review) -> PortResult<EntityId>;

    async fn get_review(&self, id: EntityId) -> PortResult<Option<Review>>;

    async fn list_reviews(&self) -> PortResult<Vec<Review>>;

    async fn list_reviews_for_employee(&self, employee_id: EntityId) -> PortResult<Vec<Review>>;

    async fn delete_review(&self, id: EntityId) -> PortResult<()>;

    // --- Messages ---
    async fn upsert_message(&self, message: &Message) -> PortResult<EntityId>;

    async fn get_message(&self, id: EntityId) -> PortResult<Option<Message>>;

    async fn list_messages(&self) -> PortResult<Vec<Message>>;

    async fn list_messages_for_user(&self, user_id: EntityId) -> PortResult<Vec<Message>>;

    async fn conversation(&self, user_id: EntityId, other_id: EntityId) -> PortResult<Vec<Message>>;

    async fn unread_messages(&self, user_id: EntityId) -> PortResult<Vec<Message>>;

    async fn unread_count(&self, user_id: EntityId) -> PortResult<i64>;

    async fn mark_message_read(&self, id: EntityId) -> PortResult<()>;

    async fn mark_conversation_read(&self, user_id: EntityId, sender_id: EntityId) -> PortResult<()>;

    async fn delete_message(&self, id: EntityId) -> PortResult<()>;

    async fn conversation_partners(&self, user_id: EntityId) -> PortResult<Vec<EntityId>>;

    // --- Attendance ---
    async fn upsert_attendance(&self, attendance: &Attendance) -> PortResult<EntityId>;

    async fn get_attendance(&self, id: EntityId) -> PortResult<Option<Attendance>>;

    async fn list_attendance(&self) -> PortResult<Vec<Attendance>>;

    async fn list_attendance_for_employee(&self, employee_id: EntityId) -> PortResult<Vec<Attendance>>;

    async fn list_attendance_for_date(&self, date: &str) -> PortResult<Vec<Attendance>>;

    /// Keyed lookup by `(employee, date)`. Not a uniqueness guarantee: the first match wins.
    async fn attendance_on(&self, employee_id: EntityId, date: &str) -> PortResult<Option<Attendance>>;

    async fn delete_attendance(&self, id: EntityId) -> PortResult<()>;

    // --- Change notification ---

    /// Subscribes to the table touched by every subsequent write.
    fn changes(&self) -> broadcast::Receiver<Collection>;
}
