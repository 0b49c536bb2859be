//! Error types for the document store

use thiserror::Error;

/// Errors returned by document store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Partial update against a document that does not exist
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Malformed document path (expected "collection/id")
    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    /// Malformed dotted field path
    #[error("Invalid field path: {0}")]
    InvalidFieldPath(String),

    /// Subscription could not be established or was interrupted
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Backend unreachable
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// IO error (persistence)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
