//! Document store abstraction for Casita Panel
//!
//! This crate defines the contract the panel expects from a real-time
//! document database (get, set, dotted-path partial update, auto-id insert,
//! filtered queries and snapshot subscriptions) together with an in-process
//! implementation that can persist itself to a JSON file.

pub mod error;
pub mod memory;
pub mod path;
pub mod persistence;
pub mod query;
pub mod snapshot;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use path::DocPath;
pub use query::{Direction, Filter, FilterOp, OrderBy, Query};
pub use snapshot::{Snapshot, SnapshotResult, Subscription};
pub use store::{DocumentStore, FieldUpdates, QueryDocument};

/// A JSON-like document: top-level field name to value
pub type Document = serde_json::Map<String, serde_json::Value>;
