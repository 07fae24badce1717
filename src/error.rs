//! Error types for the send controller.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the controller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Throttle error: {0}")]
    Throttle(#[from] ThrottleError),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Input validation errors. Raised before any mutation is attempted.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Recipient address is empty")]
    EmptyRecipient,

    #[error("Malformed recipient address: {0}")]
    MalformedRecipient(String),

    #[error("Send hour {0} out of range (expected 0-23)")]
    HourOutOfRange(u8),
}

/// Throttle optimization rejections.
#[derive(Debug, thiserror::Error)]
pub enum ThrottleError {
    #[error("Throttle optimization is disabled for campaign {campaign_id}")]
    OptimizationDisabled { campaign_id: Uuid },

    #[error("No metrics recorded for campaign {campaign_id} within the last {window:?}")]
    InsufficientData { campaign_id: Uuid, window: Duration },
}

/// Result type alias for the controller.
pub type Result<T> = std::result::Result<T, Error>;
