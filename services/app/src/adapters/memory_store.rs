//! services/app/src/adapters/memory_store.rs
//!
//! An in-process document store that implements the `RemoteStore` port:
//! nested collections addressed by `collection/id` paths, live queries,
//! partial-merge updates and all-or-nothing batches, with server-assigned
//! timestamps that strictly increase in commit order.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use storytime_core::ports::{
    BatchUpdate, Document, Fields, OrderBy, OrderKey, PortError, PortResult, QuerySnapshot,
    RemoteStore, SnapshotStream,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

//=========================================================================================
// Internal State
//=========================================================================================

struct StoredDocument {
    fields: Fields,
    create_time: DateTime<Utc>,
    update_time: DateTime<Utc>,
}

struct Subscriber {
    order_by: OrderBy,
    tx: mpsc::UnboundedSender<PortResult<QuerySnapshot>>,
}

#[derive(Default)]
struct StoreState {
    collections: HashMap<String, HashMap<String, StoredDocument>>,
    subscribers: HashMap<String, Vec<Subscriber>>,
    last_timestamp: Option<DateTime<Utc>>,
    offline: bool,
    batch_commits: u64,
}

impl StoreState {
    fn ensure_online(&self) -> PortResult<()> {
        if self.offline {
            return Err(PortError::Unexpected("store unavailable".to_string()));
        }
        Ok(())
    }

    /// Server clock: never repeats and never goes backwards.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|stored| to_document(collection, id, stored))
    }

    fn exists(&self, collection: &str, id: &str) -> bool {
        self.collections
            .get(collection)
            .is_some_and(|docs| docs.contains_key(id))
    }

    fn query(&self, collection: &str, order_by: &OrderBy) -> Vec<Document> {
        let mut documents: Vec<Document> = self
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, stored)| to_document(collection, id, stored))
                    .collect()
            })
            .unwrap_or_default();
        documents.sort_by(|a, b| {
            let ordering = match &order_by.key {
                OrderKey::CreateTime => a.create_time.cmp(&b.create_time),
                OrderKey::Field(name) => compare_values(a.fields.get(name), b.fields.get(name))
                    .then(a.create_time.cmp(&b.create_time)),
            }
            .then_with(|| a.id.cmp(&b.id));
            if order_by.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
        documents
    }

    /// Pushes a fresh snapshot to every live subscriber of `collection`,
    /// dropping subscribers whose stream has gone away.
    fn notify(&mut self, collection: &str) {
        let Some(mut subscribers) = self.subscribers.remove(collection) else {
            return;
        };
        subscribers.retain(|sub| {
            let snapshot = QuerySnapshot {
                documents: self.query(collection, &sub.order_by),
            };
            sub.tx.send(Ok(snapshot)).is_ok()
        });
        if !subscribers.is_empty() {
            self.subscribers.insert(collection.to_string(), subscribers);
        } else {
            debug!(collection, "Last subscriber left.");
        }
    }
}

fn to_document(collection: &str, id: &str, stored: &StoredDocument) -> Document {
    Document {
        id: id.to_string(),
        path: format!("{}/{}", collection, id),
        fields: stored.fields.clone(),
        create_time: stored.create_time,
        update_time: stored.update_time,
    }
}

/// Orders missing < null < bool < number < string; other values compare equal.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Splits `collection/id`. The collection part may itself be nested.
fn split_path(path: &str) -> PortResult<(&str, &str)> {
    match path.rsplit_once('/') {
        Some((collection, id)) if !collection.is_empty() && !id.is_empty() => Ok((collection, id)),
        _ => Err(PortError::Unexpected(format!("invalid document path '{}'", path))),
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An in-memory document store. Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| PortError::Unexpected("store lock poisoned".to_string()))
    }

    /// While offline every call fails, as a dropped network would.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut state) = self.lock() {
            state.offline = offline;
        }
    }

    /// How many batches have been committed successfully.
    pub fn batch_commits(&self) -> u64 {
        self.lock().map(|state| state.batch_commits).unwrap_or(0)
    }

    /// Live subscriber count for a collection.
    pub fn subscriber_count(&self, collection: &str) -> usize {
        self.lock()
            .map(|state| {
                state
                    .subscribers
                    .get(collection)
                    .map(|subs| subs.iter().filter(|s| !s.tx.is_closed()).count())
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }
}

//=========================================================================================
// `RemoteStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn subscribe(&self, collection: &str, order_by: OrderBy) -> PortResult<SnapshotStream> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            let mut state = self.lock()?;
            state.ensure_online()?;
            let initial = QuerySnapshot {
                documents: state.query(collection, &order_by),
            };
            // The receiver is still held here, so this cannot fail.
            let _ = tx.send(Ok(initial));
            state
                .subscribers
                .entry(collection.to_string())
                .or_default()
                .push(Subscriber { order_by, tx });
        }
        debug!(collection, "Subscribed.");

        let stream = async_stream::stream! {
            while let Some(snapshot) = rx.recv().await {
                yield snapshot;
            }
        };
        Ok(Box::pin(stream))
    }

    async fn get(&self, path: &str) -> PortResult<Option<Document>> {
        let (collection, id) = split_path(path)?;
        let state = self.lock()?;
        state.ensure_online()?;
        Ok(state.document(collection, id))
    }

    async fn list(&self, collection: &str, order_by: OrderBy) -> PortResult<Vec<Document>> {
        let state = self.lock()?;
        state.ensure_online()?;
        Ok(state.query(collection, &order_by))
    }

    async fn create(&self, collection: &str, fields: Fields) -> PortResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        let mut state = self.lock()?;
        state.ensure_online()?;
        let now = state.next_timestamp();
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(
                id.clone(),
                StoredDocument {
                    fields,
                    create_time: now,
                    update_time: now,
                },
            );
        state.notify(collection);
        Ok(id)
    }

    async fn update(&self, path: &str, fields: Fields) -> PortResult<()> {
        let (collection, id) = split_path(path)?;
        let mut state = self.lock()?;
        state.ensure_online()?;
        let now = state.next_timestamp();
        let stored = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| PortError::NotFound(path.to_string()))?;
        stored.fields.extend(fields);
        stored.update_time = now;
        state.notify(collection);
        Ok(())
    }

    async fn delete(&self, path: &str) -> PortResult<()> {
        let (collection, id) = split_path(path)?;
        let mut state = self.lock()?;
        state.ensure_online()?;
        let removed = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id));
        if removed.is_none() {
            return Err(PortError::NotFound(path.to_string()));
        }
        state.notify(collection);
        Ok(())
    }

    async fn commit_batch(&self, updates: Vec<BatchUpdate>) -> PortResult<()> {
        let mut state = self.lock()?;
        state.ensure_online()?;

        // Validate everything before touching anything.
        let mut targets = Vec::with_capacity(updates.len());
        for update in &updates {
            let (collection, id) = split_path(&update.path)?;
            if !state.exists(collection, id) {
                warn!(path = %update.path, "Batch rejected: missing document.");
                return Err(PortError::NotFound(update.path.clone()));
            }
            targets.push((collection.to_string(), id.to_string()));
        }

        let now = state.next_timestamp();
        let mut touched: Vec<String> = Vec::new();
        for ((collection, id), update) in targets.into_iter().zip(updates) {
            if let Some(stored) = state
                .collections
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(&id))
            {
                stored.fields.extend(update.fields);
                stored.update_time = now;
            }
            if !touched.contains(&collection) {
                touched.push(collection);
            }
        }
        state.batch_commits += 1;
        for collection in &touched {
            state.notify(collection);
        }
        Ok(())
    }
}
