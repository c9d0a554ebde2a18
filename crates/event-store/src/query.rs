use chrono::{DateTime, Utc};

use crate::{AdoptionId, Sequence};

/// Builder for constructing event queries.
///
/// Allows filtering events by aggregate, event type, sequence range, and
/// occurrence-time range. Results come back in global commit order.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Filter by aggregate ID.
    pub aggregate_id: Option<AdoptionId>,

    /// Filter by event types (any of these types).
    pub event_types: Option<Vec<String>>,

    /// Filter by minimum sequence (inclusive).
    pub from_sequence: Option<Sequence>,

    /// Filter by maximum sequence (inclusive).
    pub to_sequence: Option<Sequence>,

    /// Filter by events occurring at or after this timestamp.
    pub from_occurred_at: Option<DateTime<Utc>>,

    /// Filter by events occurring at or before this timestamp.
    pub to_occurred_at: Option<DateTime<Utc>>,

    /// Maximum number of events to return.
    pub limit: Option<usize>,

    /// Number of events to skip.
    pub offset: Option<usize>,
}

impl EventQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for a specific aggregate.
    pub fn for_aggregate(aggregate_id: AdoptionId) -> Self {
        Self {
            aggregate_id: Some(aggregate_id),
            ..Default::default()
        }
    }

    /// Creates a query for events of a specific type.
    pub fn for_event_type(event_type: impl Into<String>) -> Self {
        Self {
            event_types: Some(vec![event_type.into()]),
            ..Default::default()
        }
    }

    /// Filters by aggregate ID.
    pub fn aggregate_id(mut self, id: AdoptionId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    /// Filters by event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types = Some(vec![event_type.into()]);
        self
    }

    /// Filters by multiple event types (any of these).
    pub fn event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    /// Filters to events starting from this sequence (inclusive).
    pub fn from_sequence(mut self, sequence: Sequence) -> Self {
        self.from_sequence = Some(sequence);
        self
    }

    /// Filters to events up to this sequence (inclusive).
    pub fn to_sequence(mut self, sequence: Sequence) -> Self {
        self.to_sequence = Some(sequence);
        self
    }

    /// Filters to events occurring at or after this timestamp.
    pub fn from_occurred_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_occurred_at = Some(timestamp);
        self
    }

    /// Filters to events occurring at or before this timestamp.
    pub fn to_occurred_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_occurred_at = Some(timestamp);
        self
    }

    /// Limits the number of events returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many events before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}
