use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::AdoptionId;
use event_store::{EventStore, SequencedEvent};
use futures_util::StreamExt;

use crate::error::Result;
use crate::projection::Projection;

/// Summary of one catch-up or rebuild run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchUpReport {
    /// Distinct aggregates whose events were folded during this run.
    pub aggregates_processed: usize,

    /// Events scanned from the log during this run.
    pub events_processed: u64,

    /// Wall-clock time the run took.
    pub duration: Duration,
}

impl CatchUpReport {
    fn empty(duration: Duration) -> Self {
        Self {
            aggregates_processed: 0,
            events_processed: 0,
            duration,
        }
    }
}

/// Drives a set of projections over the committed event log.
///
/// The processor owns no projection state; it scans the store from the
/// lowest projection cursor and delivers each event to every projection
/// that has not yet seen it. It may run concurrently with writers since it
/// only ever observes committed events.
pub struct ProjectionProcessor<S> {
    store: Arc<S>,
    projections: Vec<Arc<dyn Projection>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    /// Creates a processor over the given store with no projections.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    /// Registers a projection for processing.
    pub fn register(&mut self, projection: Arc<dyn Projection>) {
        tracing::info!(projection = projection.name(), "registered projection");
        self.projections.push(projection);
    }

    /// Returns the registered projections.
    pub fn projections(&self) -> &[Arc<dyn Projection>] {
        &self.projections
    }

    /// Catches all projections up to the head of the log.
    ///
    /// Incremental: scanning starts at the lowest cursor across the
    /// registered projections, and each projection only receives events past
    /// its own cursor, so repeated runs and overlapping deliveries are safe.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<CatchUpReport> {
        let started = Instant::now();

        if self.projections.is_empty() {
            return Ok(CatchUpReport::empty(started.elapsed()));
        }
        let mut start_cursor = u64::MAX;
        for projection in &self.projections {
            start_cursor = start_cursor.min(projection.position().await.cursor);
        }

        let mut stream = self.store.stream_events_since(start_cursor).await?;
        let mut events_processed = 0u64;
        let mut aggregates: HashSet<AdoptionId> = HashSet::new();

        while let Some(event) = stream.next().await {
            let event = event?;
            self.deliver(&event).await?;
            events_processed += 1;
            aggregates.insert(event.envelope.aggregate_id);
        }

        metrics::counter!("projections_events_processed").increment(events_processed);

        let report = CatchUpReport {
            aggregates_processed: aggregates.len(),
            events_processed,
            duration: started.elapsed(),
        };
        tracing::info!(
            events = report.events_processed,
            aggregates = report.aggregates_processed,
            duration_ms = report.duration.as_millis() as u64,
            "catch-up complete"
        );
        Ok(report)
    }

    /// Delivers a single committed event to the registered projections.
    pub async fn process_event(&self, event: &SequencedEvent) -> Result<()> {
        self.deliver(event).await
    }

    /// Resets every projection and replays the log from the start.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<CatchUpReport> {
        for projection in &self.projections {
            tracing::info!(projection = projection.name(), "resetting projection");
            projection.reset().await;
        }
        self.run_catch_up().await
    }

    async fn deliver(&self, event: &SequencedEvent) -> Result<()> {
        for projection in &self.projections {
            if projection.position().await.cursor < event.position {
                projection.handle(event).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use common::{Actor, CompanyId, ProductId};
    use event_store::{
        AppendOptions, EventEnvelope, EventStoreExt, InMemoryEventStore, Sequence,
    };

    use super::*;
    use crate::projection::ProjectionPosition;

    struct CountingProjection {
        handled: AtomicU64,
        cursor: AtomicU64,
    }

    impl CountingProjection {
        fn new() -> Self {
            Self {
                handled: AtomicU64::new(0),
                cursor: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl Projection for CountingProjection {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn handle(&self, event: &SequencedEvent) -> Result<()> {
            self.handled.fetch_add(1, Ordering::SeqCst);
            self.cursor.store(event.position, Ordering::SeqCst);
            Ok(())
        }

        async fn position(&self) -> ProjectionPosition {
            ProjectionPosition::at(self.cursor.load(Ordering::SeqCst))
        }

        async fn reset(&self) {
            self.handled.store(0, Ordering::SeqCst);
            self.cursor.store(0, Ordering::SeqCst);
        }
    }

    fn envelope(aggregate_id: common::AdoptionId, sequence: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Adoption")
            .event_type("TestEvent")
            .sequence(Sequence::new(sequence))
            .actor(Actor::system("test"))
            .payload_raw(serde_json::json!({}))
            .build()
    }

    #[tokio::test]
    async fn catch_up_delivers_all_events_once() {
        let store = Arc::new(InMemoryEventStore::new());
        let id = common::AdoptionId::derive(CompanyId::new(), ProductId::new());
        for seq in 1..=5 {
            store
                .append_event(envelope(id, seq), AppendOptions::new())
                .await
                .unwrap();
        }

        let projection = Arc::new(CountingProjection::new());
        let mut processor = ProjectionProcessor::new(store);
        processor.register(projection.clone());

        let report = processor.run_catch_up().await.unwrap();
        assert_eq!(report.events_processed, 5);
        assert_eq!(report.aggregates_processed, 1);
        assert_eq!(projection.handled.load(Ordering::SeqCst), 5);

        // A second run starts at the cursor and finds nothing new
        let report = processor.run_catch_up().await.unwrap();
        assert_eq!(report.events_processed, 0);
        assert_eq!(projection.handled.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn catch_up_counts_distinct_aggregates() {
        let store = Arc::new(InMemoryEventStore::new());
        for _ in 0..3 {
            let id = common::AdoptionId::derive(CompanyId::new(), ProductId::new());
            store
                .append_event(envelope(id, 1), AppendOptions::new())
                .await
                .unwrap();
        }

        let mut processor = ProjectionProcessor::new(store);
        processor.register(Arc::new(CountingProjection::new()));

        let report = processor.run_catch_up().await.unwrap();
        assert_eq!(report.events_processed, 3);
        assert_eq!(report.aggregates_processed, 3);
    }

    #[tokio::test]
    async fn rebuild_resets_then_replays() {
        let store = Arc::new(InMemoryEventStore::new());
        let id = common::AdoptionId::derive(CompanyId::new(), ProductId::new());
        for seq in 1..=3 {
            store
                .append_event(envelope(id, seq), AppendOptions::new())
                .await
                .unwrap();
        }

        let projection = Arc::new(CountingProjection::new());
        let mut processor = ProjectionProcessor::new(store);
        processor.register(projection.clone());

        processor.run_catch_up().await.unwrap();
        let report = processor.rebuild_all().await.unwrap();
        assert_eq!(report.events_processed, 3);
        assert_eq!(projection.handled.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_processor_reports_nothing() {
        let store = Arc::new(InMemoryEventStore::new());
        let processor = ProjectionProcessor::new(store);
        let report = processor.run_catch_up().await.unwrap();
        assert_eq!(report.events_processed, 0);
        assert_eq!(report.aggregates_processed, 0);
    }

    #[tokio::test]
    async fn process_event_skips_already_seen_positions() {
        let store = Arc::new(InMemoryEventStore::new());
        let id = common::AdoptionId::derive(CompanyId::new(), ProductId::new());

        let projection = Arc::new(CountingProjection::new());
        let mut processor = ProjectionProcessor::new(store);
        processor.register(projection.clone());

        let event = SequencedEvent {
            position: 1,
            envelope: envelope(id, 1),
        };
        processor.process_event(&event).await.unwrap();
        processor.process_event(&event).await.unwrap();
        assert_eq!(projection.handled.load(Ordering::SeqCst), 1);
    }
}
