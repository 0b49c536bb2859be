//! The document store contract

use crate::error::StoreError;
use crate::path::DocPath;
use crate::query::Query;
use crate::snapshot::Subscription;
use crate::Document;
use async_trait::async_trait;
use serde_json::Value;

/// A document returned by a query, with its id
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDocument {
    pub id: String,
    pub data: Document,
}

/// Ordered set of dotted-path field writes for a partial update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdates {
    fields: Vec<(String, Value)>,
}

impl FieldUpdates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a write of `value` at dotted `path`
    #[must_use]
    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(path, value);
        self
    }

    pub fn push(&mut self, path: impl Into<String>, value: impl Into<Value>) {
        self.fields.push((path.into(), value.into()));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl IntoIterator for FieldUpdates {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Remote document database as seen by the panel
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    /// Create or replace a whole document
    async fn set(&self, path: &DocPath, document: Document) -> Result<(), StoreError>;

    /// Write only the named (dotted) fields of an existing document.
    ///
    /// Fails with [`StoreError::NotFound`] if the document does not exist.
    async fn update(&self, path: &DocPath, updates: FieldUpdates) -> Result<(), StoreError>;

    /// Insert a document with a store-assigned id, returning the id
    async fn add(&self, collection: &str, document: Document) -> Result<String, StoreError>;

    /// Run a filtered, ordered query over one collection
    async fn query(&self, query: &Query) -> Result<Vec<QueryDocument>, StoreError>;

    /// Open a standing subscription to one document
    fn subscribe(&self, path: &DocPath) -> Result<Subscription, StoreError>;
}
