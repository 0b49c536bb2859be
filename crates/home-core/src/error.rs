//! Error types for the home control core

use docstore::StoreError;
use thiserror::Error;

/// Errors that can occur in the home control core
#[derive(Error, Debug)]
pub enum HomeError {
    /// Document store operation failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A stored record does not have the expected shape
    #[error("Malformed record {id}: {reason}")]
    MalformedRecord { id: String, reason: String },

    /// Field does not exist on the device, or may not be changed
    #[error("Unknown field '{field}' for device {device_id}")]
    UnknownField { device_id: String, field: String },

    /// Field exists but the new value has the wrong type or range
    #[error("Invalid value for {device_id}.{field}: {reason}")]
    InvalidValue {
        device_id: String,
        field: String,
        reason: String,
    },

    /// Mutation without any field to change
    #[error("Empty update for device {0}")]
    EmptyUpdate(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
