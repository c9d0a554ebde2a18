use async_trait::async_trait;
use event_store::SequencedEvent;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A projection's position in the global event log.
///
/// The cursor is the global position of the last event the projection has
/// seen; catch-up resumes from the event after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectionPosition {
    /// Global position of the last handled event, 0 before any.
    pub cursor: u64,
}

impl ProjectionPosition {
    /// Creates a position at the start of the log.
    pub fn start() -> Self {
        Self::default()
    }

    /// Creates a position at a specific cursor.
    pub fn at(cursor: u64) -> Self {
        Self { cursor }
    }
}

/// A read-model projection folded from the event log.
///
/// Projections are deterministic: folding the same events in the same order
/// always produces the same state. They never perform I/O of their own and
/// hold all state behind interior mutability so the processor can share them.
#[async_trait]
pub trait Projection: Send + Sync {
    /// A stable name for logging and diagnostics.
    fn name(&self) -> &'static str;

    /// Folds one committed event into the projection.
    ///
    /// Redelivery must be idempotent: an event at or below the projection's
    /// own watermark is absorbed without effect.
    async fn handle(&self, event: &SequencedEvent) -> Result<()>;

    /// Returns the projection's current catch-up cursor.
    async fn position(&self) -> ProjectionPosition;

    /// Discards all state, returning the projection to the start of the log.
    async fn reset(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_starts_at_zero() {
        assert_eq!(ProjectionPosition::start().cursor, 0);
        assert_eq!(ProjectionPosition::default().cursor, 0);
    }

    #[test]
    fn position_at_cursor() {
        let pos = ProjectionPosition::at(42);
        assert_eq!(pos.cursor, 42);
        assert_ne!(pos, ProjectionPosition::start());
    }
}
