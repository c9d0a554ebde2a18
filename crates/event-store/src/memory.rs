use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AdoptionId, EventEnvelope, EventQuery, EventStoreError, Result, Sequence, SequencedEvent,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

/// In-memory event store implementation for tests and the demo server.
///
/// Insertion order is the global log order; the vector index (1-based)
/// serves as the global position.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Sequence> {
        validate_events_for_append(&events)?;

        let first_event = &events[0];
        let aggregate_id = first_event.aggregate_id;

        let mut store = self.events.write().await;

        // Current sequence for this aggregate
        let current = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.sequence)
            .max()
            .unwrap_or(Sequence::initial());

        if let Some(expected) = options.expected_sequence
            && current != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current,
            });
        }

        // Unique (aggregate, sequence) constraint simulation
        if first_event.sequence != current.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_sequence.unwrap_or(current),
                actual: current,
            });
        }

        let last_sequence = events
            .last()
            .map(|e| e.sequence)
            .unwrap_or(Sequence::initial());
        store.extend(events);
        metrics::counter!("event_store_events_appended").increment(1);

        Ok(last_sequence)
    }

    async fn events_for_aggregate(&self, aggregate_id: AdoptionId) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }

    async fn events_for_aggregate_from(
        &self,
        aggregate_id: AdoptionId,
        from_sequence: Sequence,
    ) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id && e.sequence >= from_sequence)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let events: Vec<_> = store
            .iter()
            .filter(|e| {
                if let Some(id) = query.aggregate_id
                    && e.aggregate_id != id
                {
                    return false;
                }
                if let Some(ref types) = query.event_types
                    && !types.contains(&e.event_type)
                {
                    return false;
                }
                if let Some(from) = query.from_sequence
                    && e.sequence < from
                {
                    return false;
                }
                if let Some(to) = query.to_sequence
                    && e.sequence > to
                {
                    return false;
                }
                if let Some(from) = query.from_occurred_at
                    && e.occurred_at < from
                {
                    return false;
                }
                if let Some(to) = query.to_occurred_at
                    && e.occurred_at > to
                {
                    return false;
                }
                true
            })
            .cloned()
            .collect();

        // Global (insertion) order already holds; apply offset and limit
        let offset = query.offset.unwrap_or(0);
        let events: Vec<_> = events.into_iter().skip(offset).collect();

        let events = if let Some(limit) = query.limit {
            events.into_iter().take(limit).collect()
        } else {
            events
        };

        Ok(events)
    }

    async fn stream_events_since(&self, cursor: u64) -> Result<EventStream> {
        use futures_util::stream;

        let store = self.events.read().await;
        let events: Vec<SequencedEvent> = store
            .iter()
            .enumerate()
            .map(|(index, envelope)| SequencedEvent {
                position: index as u64 + 1,
                envelope: envelope.clone(),
            })
            .filter(|e| e.position > cursor)
            .collect();

        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn current_sequence(&self, aggregate_id: AdoptionId) -> Result<Option<Sequence>> {
        let store = self.events.read().await;
        let sequence = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.sequence)
            .max();
        Ok(sequence)
    }
}
