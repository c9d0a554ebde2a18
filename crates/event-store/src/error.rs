use thiserror::Error;

use crate::{AdoptionId, Sequence};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// A concurrency conflict occurred when appending events.
    /// The expected sequence did not match the actual sequence.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected sequence {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AdoptionId,
        expected: Sequence,
        actual: Sequence,
    },

    /// The aggregate was not found in the event store.
    #[error("Aggregate not found: {0}")]
    AggregateNotFound(AdoptionId),

    /// The batch handed to `append` was malformed (empty, mixed aggregates,
    /// or non-consecutive sequences).
    #[error("Invalid append batch: {0}")]
    InvalidAppend(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
