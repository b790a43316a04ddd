//! In-process content store.
//!
//! Holds documents in memory and pushes snapshots synchronously. Used for tests
//! and for running the service without a database file.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ContentStore, MonotonicClock, Precondition, SnapshotCallback, SubscriberSet};
use crate::errors::AppError;
use crate::models::{strip_reserved, Collection, Document, Fields, Filter, Snapshot};
use crate::subscription::Subscription;

#[derive(Default)]
struct Inner {
    /// Documents per collection in insertion order
    collections: HashMap<Collection, Vec<Document>>,
    revision: i64,
}

impl Inner {
    fn snapshot(&self, collection: Collection) -> Snapshot {
        Snapshot {
            collection,
            revision: self.revision,
            documents: self
                .collections
                .get(&collection)
                .cloned()
                .unwrap_or_default(),
        }
    }

    fn find_mut(&mut self, collection: Collection, id: &str) -> Option<&mut Document> {
        self.collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
    }
}

/// In-memory [`ContentStore`].
pub struct MemoryStore {
    inner: Mutex<Inner>,
    /// Serializes commit + delivery so pushes arrive in commit order
    delivery: Mutex<()>,
    subscribers: Arc<SubscriberSet>,
    clock: MonotonicClock,
    offline: AtomicBool,
    /// Snapshots held back while delivery is paused
    held: Mutex<Option<Vec<Snapshot>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            delivery: Mutex::new(()),
            subscribers: SubscriberSet::new(),
            clock: MonotonicClock::new(),
            offline: AtomicBool::new(false),
            held: Mutex::new(None),
        }
    }

    /// Make every write fail with a store error, as a lost connection would.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Hold back snapshot pushes, simulating a lagging listener. Resuming
    /// flushes the held snapshots in commit order.
    pub fn pause_delivery(&self) {
        let mut held = self.held.lock();
        if held.is_none() {
            *held = Some(Vec::new());
        }
    }

    pub fn resume_delivery(&self) {
        let _delivery = self.delivery.lock();
        let held = self.held.lock().take().unwrap_or_default();
        for snapshot in &held {
            self.subscribers.deliver(snapshot);
        }
    }

    /// Break every live view of a collection.
    pub fn fail_subscriptions(&self, collection: Collection, message: &str) {
        let _delivery = self.delivery.lock();
        self.subscribers.fail(collection, message);
    }

    /// Number of live subscribers across all collections.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn ensure_online(&self) -> Result<(), AppError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::Store(
                "Content store is unreachable".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply a write and push the resulting snapshot.
    fn commit<T>(
        &self,
        collection: Collection,
        write: impl FnOnce(&mut Inner) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        self.ensure_online()?;
        let _delivery = self.delivery.lock();

        let (result, snapshot) = {
            let mut inner = self.inner.lock();
            let result = write(&mut *inner)?;
            inner.revision += 1;
            (result, inner.snapshot(collection))
        };

        {
            let mut held = self.held.lock();
            if let Some(queue) = held.as_mut() {
                queue.push(snapshot);
                return Ok(result);
            }
        }

        self.subscribers.deliver(&snapshot);
        Ok(result)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn subscribe_filtered(
        &self,
        collection: Collection,
        filter: Filter,
        callback: SnapshotCallback,
    ) -> Result<Subscription, AppError> {
        self.ensure_online()?;
        let _delivery = self.delivery.lock();

        let (id, subscription) = self.subscribers.register(collection, filter, callback);
        let snapshot = self.inner.lock().snapshot(collection);
        self.subscribers.deliver_to(id, &snapshot);

        Ok(subscription)
    }

    async fn create(&self, collection: Collection, fields: Fields) -> Result<String, AppError> {
        let now = self.clock.now();
        let id = uuid::Uuid::new_v4().to_string();
        let fields = strip_reserved(fields);

        let created = id.clone();
        self.commit(collection, move |inner| {
            inner.collections.entry(collection).or_default().push(Document {
                id: created,
                fields,
                created_at: Some(now),
                updated_at: Some(now),
                version: 1,
            });
            Ok(())
        })?;

        tracing::debug!(%collection, %id, "Document created");
        Ok(id)
    }

    async fn upsert(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> Result<(), AppError> {
        let now = self.clock.now();
        let fields = strip_reserved(fields);

        self.commit(collection, |inner| {
            match inner.find_mut(collection, id) {
                Some(doc) => {
                    doc.fields.extend(fields);
                    doc.updated_at = Some(now);
                    doc.version += 1;
                }
                None => inner.collections.entry(collection).or_default().push(Document {
                    id: id.to_string(),
                    fields,
                    created_at: Some(now),
                    updated_at: Some(now),
                    version: 1,
                }),
            }
            Ok(())
        })
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
        precondition: Option<Precondition>,
    ) -> Result<(), AppError> {
        let now = self.clock.now();
        let fields = strip_reserved(fields);

        self.commit(collection, |inner| {
            let doc = inner.find_mut(collection, id).ok_or_else(|| {
                AppError::NotFound(format!("Document {}/{} not found", collection, id))
            })?;

            if let Some(Precondition::Version(expected)) = precondition {
                if doc.version != expected {
                    return Err(AppError::Conflict {
                        message: format!(
                            "Version mismatch: expected {}, current {}",
                            expected, doc.version
                        ),
                        current_version: doc.version,
                    });
                }
            }

            doc.fields.extend(fields);
            doc.updated_at = Some(now);
            doc.version += 1;
            Ok(())
        })
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), AppError> {
        self.commit(collection, |inner| {
            let docs = inner.collections.entry(collection).or_default();
            let before = docs.len();
            docs.retain(|d| d.id != id);
            if docs.len() == before {
                return Err(AppError::NotFound(format!(
                    "Document {}/{} not found",
                    collection, id
                )));
            }
            Ok(())
        })
    }

    async fn snapshot(&self, collection: Collection) -> Result<Snapshot, AppError> {
        self.ensure_online()?;
        Ok(self.inner.lock().snapshot(collection))
    }

    async fn revision(&self) -> Result<i64, AppError> {
        Ok(self.inner.lock().revision)
    }
}
