//! Store wrapper with injectable faults for unit tests

use async_trait::async_trait;
use docstore::{
    DocPath, Document, DocumentStore, FieldUpdates, MemoryStore, Query, QueryDocument, StoreError,
    Subscription,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
pub(crate) struct FaultyStore {
    pub inner: MemoryStore,
    /// Number of upcoming subscriptions that fail right after opening
    pub failing_subscriptions: AtomicUsize,
    /// Partial updates fail while set
    pub broken_updates: AtomicBool,
    /// Number of upcoming whole-document writes that fail
    pub failing_sets: AtomicUsize,
}

impl FaultyStore {
    pub fn with_failing_subscriptions(count: usize) -> Self {
        Self {
            failing_subscriptions: AtomicUsize::new(count),
            ..Self::default()
        }
    }

    pub fn with_failing_sets(count: usize) -> Self {
        Self {
            failing_sets: AtomicUsize::new(count),
            ..Self::default()
        }
    }

    pub fn break_updates(&self) {
        self.broken_updates.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        self.inner.get(path).await
    }

    async fn set(&self, path: &DocPath, document: Document) -> Result<(), StoreError> {
        let fail = self
            .failing_sets
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(StoreError::Unavailable("write timed out".into()));
        }
        self.inner.set(path, document).await
    }

    async fn update(&self, path: &DocPath, updates: FieldUpdates) -> Result<(), StoreError> {
        if self.broken_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("permission denied".into()));
        }
        self.inner.update(path, updates).await
    }

    async fn add(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        self.inner.add(collection, document).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<QueryDocument>, StoreError> {
        self.inner.query(query).await
    }

    fn subscribe(&self, path: &DocPath) -> Result<Subscription, StoreError> {
        let fail = self
            .failing_subscriptions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            let (tx, subscription) = Subscription::channel(path.clone());
            let _ = tx.send(Err(StoreError::Unavailable("offline".into())));
            return Ok(subscription);
        }
        self.inner.subscribe(path)
    }
}
