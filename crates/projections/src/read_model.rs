use async_trait::async_trait;

/// A queryable read model built by a projection.
///
/// Read models answer queries for the API layer; they are populated only by
/// folding events and never written to directly.
#[async_trait]
pub trait ReadModel: Send + Sync {
    /// A stable name for logging and diagnostics.
    fn name(&self) -> &'static str;

    /// Number of entries currently held by the read model.
    async fn count(&self) -> usize;
}
