//! In-process document store with optional JSON file persistence

use crate::error::StoreError;
use crate::path::{set_field, DocPath};
use crate::persistence::{self, Collections};
use crate::query::Query;
use crate::snapshot::{Snapshot, SnapshotResult, Subscription};
use crate::store::{DocumentStore, FieldUpdates, QueryDocument};
use crate::Document;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, Mutex};

/// Document store kept in memory.
///
/// Every write is pushed to the subscribers of the written document. When
/// opened with [`MemoryStore::open`], the whole store is also rewritten to
/// disk before each write is applied; a write that cannot be saved is not
/// applied and not published.
pub struct MemoryStore {
    /// All documents, keyed by path
    documents: DashMap<DocPath, Document>,
    /// Live subscribers per document
    listeners: DashMap<DocPath, Vec<mpsc::UnboundedSender<SnapshotResult>>>,
    /// Path of the JSON file backing this store
    data_path: Option<PathBuf>,
    /// Serializes writes
    write_lock: Mutex<()>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty, non-persistent store
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            listeners: DashMap::new(),
            data_path: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Open a store backed by a JSON file, loading whatever it contains
    pub async fn open(path: &Path) -> Self {
        let documents = DashMap::new();
        for (collection, docs) in persistence::load_collections(path).await {
            for (id, document) in docs {
                documents.insert(DocPath::new(collection.clone(), id), document);
            }
        }

        Self {
            documents,
            listeners: DashMap::new(),
            data_path: Some(path.to_path_buf()),
            write_lock: Mutex::new(()),
        }
    }

    /// Number of stored documents across all collections
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of live subscribers on a document
    #[must_use]
    pub fn subscriber_count(&self, path: &DocPath) -> usize {
        self.listeners
            .get(path)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    fn collections(&self) -> Collections {
        let mut collections = Collections::new();
        for entry in self.documents.iter() {
            collections
                .entry(entry.key().collection().to_string())
                .or_default()
                .insert(entry.key().id().to_string(), entry.value().clone());
        }
        collections
    }

    /// Save the store with `document` staged at `path`, then apply and
    /// publish it. Callers hold `write_lock`.
    async fn commit(&self, path: &DocPath, document: Document) -> Result<(), StoreError> {
        if let Some(data_path) = &self.data_path {
            let mut collections = self.collections();
            collections
                .entry(path.collection().to_string())
                .or_default()
                .insert(path.id().to_string(), document.clone());
            persistence::save_collections(data_path, &collections).await?;
        }
        self.documents.insert(path.clone(), document);
        self.notify(path);
        Ok(())
    }

    /// Push the current state of a document to its subscribers.
    ///
    /// The state is read while the listener list is locked, so every
    /// subscriber sees writes in order.
    fn notify(&self, path: &DocPath) {
        if let Some(mut senders) = self.listeners.get_mut(path) {
            let snapshot = Snapshot {
                path: path.clone(),
                data: self.documents.get(path).map(|d| d.value().clone()),
            };
            senders.retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
            tracing::trace!("Notified {} subscribers of {}", senders.len(), path);
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        Ok(self.documents.get(path).map(|d| d.value().clone()))
    }

    async fn set(&self, path: &DocPath, document: Document) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.commit(path, document).await
    }

    async fn update(&self, path: &DocPath, updates: FieldUpdates) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        // Apply to a copy so a bad field path leaves the document untouched
        let mut staged = self
            .documents
            .get(path)
            .map(|d| d.value().clone())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        for (field, value) in updates {
            set_field(&mut staged, &field, value)?;
        }
        self.commit(path, staged).await
    }

    async fn add(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        if collection.is_empty() || collection.contains('/') {
            return Err(StoreError::InvalidPath(collection.to_string()));
        }
        let id = uuid::Uuid::new_v4().simple().to_string();
        let path = DocPath::new(collection, id.clone());
        let _guard = self.write_lock.lock().await;
        self.commit(&path, document).await?;
        Ok(id)
    }

    async fn query(&self, query: &Query) -> Result<Vec<QueryDocument>, StoreError> {
        let candidates: Vec<QueryDocument> = self
            .documents
            .iter()
            .filter(|entry| entry.key().collection() == query.collection)
            .map(|entry| QueryDocument {
                id: entry.key().id().to_string(),
                data: entry.value().clone(),
            })
            .collect();
        Ok(query.apply(candidates))
    }

    fn subscribe(&self, path: &DocPath) -> Result<Subscription, StoreError> {
        let (tx, subscription) = Subscription::channel(path.clone());
        let mut senders = self.listeners.entry(path.clone()).or_default();

        let initial = Snapshot {
            path: path.clone(),
            data: self.documents.get(path).map(|d| d.value().clone()),
        };
        tx.send(Ok(initial))
            .map_err(|_| StoreError::Subscription(path.to_string()))?;
        senders.push(tx);

        tracing::debug!("New subscription to {}", path);
        Ok(subscription)
    }
}
