//! Typed local cache fed by one store subscription.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;

use crate::errors::AppError;
use crate::models::{Alert, Banner, Collection, Filter, Snapshot, BANNER_ID};
use crate::store::{ContentStore, SnapshotCallback};
use crate::subscription::Subscription;

/// A record type that can be materialized in a [`LiveView`].
pub trait ViewRecord: DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    /// Put freshly decoded items into presentation order.
    fn arrange(_items: &mut [Self]) {}
}

impl ViewRecord for Alert {
    fn id(&self) -> &str {
        &self.id
    }

    /// Newest first. A missing `createdAt` sorts last.
    fn arrange(items: &mut [Self]) {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}

impl ViewRecord for Banner {
    fn id(&self) -> &str {
        &self.id
    }

    /// The well-known singleton first; otherwise snapshot order decides.
    fn arrange(items: &mut [Self]) {
        items.sort_by_key(|b| b.id != BANNER_ID);
    }
}

struct ViewState<T> {
    items: Vec<T>,
    revision: i64,
    loaded: bool,
    error: Option<AppError>,
}

/// Materialized view of one collection. Each push replaces the whole cache.
pub struct LiveView<T> {
    collection: Collection,
    state: RwLock<ViewState<T>>,
}

impl<T: ViewRecord> LiveView<T> {
    pub fn new(collection: Collection) -> Arc<Self> {
        Arc::new(Self {
            collection,
            state: RwLock::new(ViewState {
                items: Vec::new(),
                revision: 0,
                loaded: false,
                error: None,
            }),
        })
    }

    /// Subscribe a new view to `collection` on `store`.
    pub async fn attach(
        store: &dyn ContentStore,
        collection: Collection,
        filter: Filter,
    ) -> Result<(Arc<Self>, Subscription), AppError> {
        let view = Self::new(collection);
        let subscription = store
            .subscribe_filtered(collection, filter, view.callback())
            .await?;
        Ok((view, subscription))
    }

    /// Callback that feeds pushes into this view.
    pub fn callback(self: &Arc<Self>) -> SnapshotCallback {
        let view = self.clone();
        Arc::new(move |result| view.apply(result))
    }

    /// Apply one push from the store.
    pub fn apply(&self, result: Result<Snapshot, AppError>) {
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(collection = %self.collection, "Live view broken: {}", e);
                self.state.write().error = Some(e);
                return;
            }
        };

        let mut items = Vec::with_capacity(snapshot.documents.len());
        for doc in &snapshot.documents {
            match doc.decode::<T>() {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(
                    collection = %self.collection,
                    id = %doc.id,
                    "Skipping undecodable document: {}",
                    e
                ),
            }
        }
        T::arrange(&mut items);

        let mut state = self.state.write();
        if state.loaded && snapshot.revision < state.revision {
            tracing::debug!(
                collection = %self.collection,
                revision = snapshot.revision,
                current = state.revision,
                "Ignoring out-of-date snapshot"
            );
            return;
        }
        state.items = items;
        state.revision = snapshot.revision;
        state.loaded = true;
        state.error = None;
        tracing::debug!(
            collection = %self.collection,
            revision = snapshot.revision,
            count = state.items.len(),
            "Live view refreshed"
        );
    }

    pub fn items(&self) -> Vec<T> {
        self.state.read().items.clone()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.state
            .read()
            .items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    pub fn first(&self) -> Option<T> {
        self.state.read().items.first().cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store revision of the last applied snapshot.
    pub fn revision(&self) -> i64 {
        self.state.read().revision
    }

    /// Whether at least one snapshot has arrived.
    pub fn is_loaded(&self) -> bool {
        self.state.read().loaded
    }

    /// The error that broke the view, if any. Cleared by the next good push.
    pub fn last_error(&self) -> Option<AppError> {
        self.state.read().error.clone()
    }

    pub fn is_stale(&self) -> bool {
        self.state.read().error.is_some()
    }
}
