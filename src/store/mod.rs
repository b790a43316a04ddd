//! Content store boundary.
//!
//! The store owns persistent state. Every committed write pushes the full current
//! snapshot of the written collection to each live subscriber, in commit order.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{init_database, SqliteStore};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use parking_lot::Mutex;

use crate::errors::AppError;
use crate::models::{Collection, Fields, Filter, Snapshot};
use crate::subscription::Subscription;

/// Callback receiving each pushed snapshot, or the error that broke the view.
pub type SnapshotCallback = Arc<dyn Fn(Result<Snapshot, AppError>) + Send + Sync>;

/// Write precondition checked by the store before applying an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// The document's version must equal this value
    Version(i64),
}

/// A document database with live subscriptions.
///
/// Callbacks run on the writer's task after the write commits. They must not
/// write to the store themselves.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Watch a whole collection. The callback fires once with the current
    /// snapshot and then once per committed change.
    async fn subscribe(
        &self,
        collection: Collection,
        callback: SnapshotCallback,
    ) -> Result<Subscription, AppError> {
        self.subscribe_filtered(collection, Filter::All, callback)
            .await
    }

    /// Watch the documents of a collection that match `filter`.
    async fn subscribe_filtered(
        &self,
        collection: Collection,
        filter: Filter,
        callback: SnapshotCallback,
    ) -> Result<Subscription, AppError>;

    /// Create a document with a store-assigned id. Stamps `createdAt` and
    /// `updatedAt` to the same instant.
    async fn create(&self, collection: Collection, fields: Fields) -> Result<String, AppError>;

    /// Create the document at `id`, or merge into it if it exists.
    async fn upsert(&self, collection: Collection, id: &str, fields: Fields)
        -> Result<(), AppError>;

    /// Merge `fields` into an existing document and stamp `updatedAt`.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
        precondition: Option<Precondition>,
    ) -> Result<(), AppError>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), AppError>;

    /// One-shot read of a collection.
    async fn snapshot(&self, collection: Collection) -> Result<Snapshot, AppError>;

    /// Current store revision; advances on every write.
    async fn revision(&self) -> Result<i64, AppError>;
}

struct Subscriber {
    id: u64,
    collection: Collection,
    filter: Filter,
    callback: SnapshotCallback,
    active: Arc<AtomicBool>,
}

/// Registry of live subscribers shared by the store implementations.
pub(crate) struct SubscriberSet {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl SubscriberSet {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Register a subscriber and return its id and cancel handle.
    pub(crate) fn register(
        self: &Arc<Self>,
        collection: Collection,
        filter: Filter,
        callback: SnapshotCallback,
    ) -> (u64, Subscription) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));

        self.subscribers.lock().push(Subscriber {
            id,
            collection,
            filter,
            callback,
            active: active.clone(),
        });
        tracing::debug!(subscriber = id, %collection, "Subscriber registered");

        let registry = Arc::downgrade(self);
        let subscription = Subscription::new(move || {
            active.store(false, Ordering::SeqCst);
            if let Some(registry) = registry.upgrade() {
                registry.subscribers.lock().retain(|s| s.id != id);
                tracing::debug!(subscriber = id, "Subscriber cancelled");
            }
        });

        (id, subscription)
    }

    /// Push a snapshot to one subscriber (initial delivery).
    pub(crate) fn deliver_to(&self, id: u64, snapshot: &Snapshot) {
        let target = self
            .subscribers
            .lock()
            .iter()
            .find(|s| s.id == id)
            .map(|s| (s.filter.clone(), s.callback.clone(), s.active.clone()));

        if let Some((filter, callback, active)) = target {
            if active.load(Ordering::SeqCst) {
                callback(Ok(snapshot.filtered(&filter)));
            }
        }
    }

    /// Push a snapshot to every subscriber of its collection.
    pub(crate) fn deliver(&self, snapshot: &Snapshot) {
        // Callbacks run outside the registry lock so they may cancel themselves.
        for (filter, callback, active) in self.targets(snapshot.collection) {
            if active.load(Ordering::SeqCst) {
                callback(Ok(snapshot.filtered(&filter)));
            }
        }
    }

    /// Report a broken live view to every subscriber of a collection.
    pub(crate) fn fail(&self, collection: Collection, message: &str) {
        for (_, callback, active) in self.targets(collection) {
            if active.load(Ordering::SeqCst) {
                callback(Err(AppError::Subscription(message.to_string())));
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn targets(&self, collection: Collection) -> Vec<(Filter, SnapshotCallback, Arc<AtomicBool>)> {
        self.subscribers
            .lock()
            .iter()
            .filter(|s| s.collection == collection)
            .map(|s| (s.filter.clone(), s.callback.clone(), s.active.clone()))
            .collect()
    }
}

/// Server timestamp source. Never returns the same instant twice, so later
/// writes always sort higher. Stamps have microsecond precision, which is what
/// the SQLite store persists.
pub(crate) struct MonotonicClock {
    last: Mutex<DateTime<Utc>>,
}

impl MonotonicClock {
    pub(crate) fn new() -> Self {
        Self::starting_after(DateTime::<Utc>::MIN_UTC)
    }

    pub(crate) fn starting_after(last: DateTime<Utc>) -> Self {
        Self {
            last: Mutex::new(last),
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock();
        let now = Utc::now().trunc_subsecs(6);
        let next = if now > *last {
            now
        } else {
            *last + Duration::microseconds(1)
        };
        *last = next;
        next
    }
}
