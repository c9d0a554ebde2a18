use thiserror::Error;

/// Errors that can occur in the projection layer.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The underlying event store failed.
    #[error("event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// A stored payload could not be deserialized into a domain event.
    #[error("failed to deserialize event payload: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// A projection rejected an event.
    #[error("projection error: {0}")]
    Projection(String),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
