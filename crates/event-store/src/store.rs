use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AdoptionId, EventEnvelope, EventQuery, EventStoreError, Result, Sequence, SequencedEvent};

/// Options for appending events to the store.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected sequence of the aggregate for optimistic concurrency control.
    /// If None, no check is performed (use with caution).
    pub expected_sequence: Option<Sequence>,
}

impl AppendOptions {
    /// Creates options with no sequence check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the aggregate to be at a specific sequence.
    pub fn expect_sequence(sequence: Sequence) -> Self {
        Self {
            expected_sequence: Some(sequence),
        }
    }

    /// Creates options expecting the aggregate to not exist (new aggregate).
    pub fn expect_new() -> Self {
        Self {
            expected_sequence: Some(Sequence::initial()),
        }
    }
}

/// A stream of globally-positioned events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<SequencedEvent>> + Send>>;

/// Core trait for event store implementations.
///
/// An event store is responsible for persisting and retrieving events.
/// All implementations must be thread-safe (Send + Sync). Only the command
/// layer writes to it; projections and queries are read-only consumers.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch of events to the store.
    ///
    /// The batch is transactional: either all events are durably appended at
    /// consecutive sequence numbers or none are. If
    /// `options.expected_sequence` is set, the operation fails with
    /// `ConcurrencyConflict` when the aggregate's current sequence doesn't
    /// match, and the caller must reload before retrying.
    ///
    /// Returns the new sequence of the aggregate after appending.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Sequence>;

    /// Retrieves all events for a specific aggregate, in sequence order.
    async fn events_for_aggregate(&self, aggregate_id: AdoptionId) -> Result<Vec<EventEnvelope>>;

    /// Retrieves events for an aggregate starting from a specific sequence
    /// (inclusive).
    async fn events_for_aggregate_from(
        &self,
        aggregate_id: AdoptionId,
        from_sequence: Sequence,
    ) -> Result<Vec<EventEnvelope>>;

    /// Retrieves events matching a query.
    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>>;

    /// Streams committed events across all aggregates whose global position
    /// is greater than `cursor`, in commit order.
    ///
    /// Pass `0` to stream from the beginning. This is the projector's
    /// catch-up scan; positions let a caller resume where it left off.
    async fn stream_events_since(&self, cursor: u64) -> Result<EventStream>;

    /// Gets the current sequence of an aggregate.
    ///
    /// Returns None if the aggregate doesn't exist.
    async fn current_sequence(&self, aggregate_id: AdoptionId) -> Result<Option<Sequence>>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends a single event to the store.
    async fn append_event(&self, event: EventEnvelope, options: AppendOptions) -> Result<Sequence> {
        self.append(vec![event], options).await
    }

    /// Checks if an aggregate exists (has any events).
    async fn aggregate_exists(&self, aggregate_id: AdoptionId) -> Result<bool> {
        Ok(self.current_sequence(aggregate_id).await?.is_some())
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates a batch of events before appending.
///
/// The batch must be non-empty, all for the same aggregate, and carry
/// consecutive sequence numbers.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let first = match events.first() {
        Some(first) => first,
        None => {
            return Err(EventStoreError::InvalidAppend(
                "cannot append empty event batch".to_string(),
            ));
        }
    };

    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidAppend(
                "all events in a batch must be for the same aggregate".to_string(),
            ));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidAppend(
                "all events in a batch must have the same aggregate type".to_string(),
            ));
        }
    }

    let mut expected = first.sequence;
    for event in events.iter().skip(1) {
        expected = expected.next();
        if event.sequence != expected {
            return Err(EventStoreError::InvalidAppend(format!(
                "event sequences must be consecutive: expected {}, got {}",
                expected, event.sequence
            )));
        }
    }

    Ok(())
}
