//! crates/storytime_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core consumes.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete document store, auth provider and alert UI.

use crate::domain::{Alert, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde_json::{Map, Value};
use std::pin::Pin;
use tokio::sync::watch;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network, store).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Document Model
//=========================================================================================

/// The field map of a stored document.
pub type Fields = Map<String, Value>;

/// Turns a `json!` object literal into a field map. Non-objects give an empty map.
pub fn fields_of(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// A document as returned by the store, with server-assigned timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    /// Full path, `collection/id`.
    pub path: String,
    pub fields: Fields,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// Every document of a collection at one committed point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySnapshot {
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderKey {
    CreateTime,
    Field(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub key: OrderKey,
    pub descending: bool,
}

impl OrderBy {
    pub fn create_time() -> Self {
        Self {
            key: OrderKey::CreateTime,
            descending: false,
        }
    }

    pub fn field(name: impl Into<String>) -> Self {
        Self {
            key: OrderKey::Field(name.into()),
            descending: false,
        }
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }
}

/// One partial-merge update inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchUpdate {
    pub path: String,
    pub fields: Fields,
}

/// A push-based stream of collection snapshots. Dropping it unsubscribes.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = PortResult<QuerySnapshot>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Live query over a collection. The current snapshot is delivered first,
    /// then one snapshot per committed change, in commit order.
    async fn subscribe(&self, collection: &str, order_by: OrderBy) -> PortResult<SnapshotStream>;

    async fn get(&self, path: &str) -> PortResult<Option<Document>>;

    async fn list(&self, collection: &str, order_by: OrderBy) -> PortResult<Vec<Document>>;

    /// Creates a document with a store-generated id and returns that id.
    async fn create(&self, collection: &str, fields: Fields) -> PortResult<String>;

    /// Merges `fields` into an existing document.
    async fn update(&self, path: &str, fields: Fields) -> PortResult<()>;

    async fn delete(&self, path: &str) -> PortResult<()>;

    /// Applies every update or none of them.
    async fn commit_batch(&self, updates: Vec<BatchUpdate>) -> PortResult<()>;
}

impl dyn RemoteStore {
    /// Starts an atomic write batch against this store.
    pub fn batch(&self) -> WriteBatch<'_> {
        WriteBatch {
            store: self,
            updates: Vec::new(),
        }
    }
}

/// Collects updates and commits them as a single all-or-nothing write.
pub struct WriteBatch<'a> {
    store: &'a dyn RemoteStore,
    updates: Vec<BatchUpdate>,
}

impl WriteBatch<'_> {
    pub fn update(&mut self, path: impl Into<String>, fields: Fields) -> &mut Self {
        self.updates.push(BatchUpdate {
            path: path.into(),
            fields,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub async fn commit(self) -> PortResult<()> {
        if self.updates.is_empty() {
            return Ok(());
        }
        self.store.commit_batch(self.updates).await
    }
}

/// Who is signed in right now, and when that changes.
pub trait AuthSession: Send + Sync {
    fn current_user(&self) -> Option<User>;

    /// Follows sign-in and sign-out.
    fn changes(&self) -> watch::Receiver<Option<User>>;
}

/// Shows alert dialogs to the user.
pub trait Notifier: Send + Sync {
    fn alert(&self, alert: Alert);
}
