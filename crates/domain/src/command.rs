//! Command handling infrastructure.

use std::marker::PhantomData;

use common::{Actor, AdoptionId};
use event_store::{AppendOptions, EventEnvelope, EventId, EventStore, EventStoreError, Sequence};
use serde::Serialize;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Maximum number of attempts for a command that loses an optimistic
/// concurrency race. Each retry reloads the aggregate and re-runs the
/// decision against fresh state.
const MAX_ATTEMPTS: usize = 3;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// Ids of the persisted event envelopes, in order.
    pub event_ids: Vec<EventId>,

    /// The new sequence of the aggregate after the command.
    pub new_sequence: Sequence,
}

/// Trait for commands that can be executed against an aggregate.
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the aggregate's current state doesn't allow the action.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AdoptionId;

    /// Returns the actor issuing this command.
    fn actor(&self) -> &Actor;
}

/// Handler for executing commands against aggregates.
///
/// The handler is responsible for:
/// 1. Loading the aggregate from the event store by replay
/// 2. Executing the command to produce events
/// 3. Persisting the events atomically with optimistic concurrency
/// 4. Retrying against fresh state if another writer won the race
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a new command handler with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate from the event store.
    ///
    /// If the aggregate doesn't exist, returns a default instance.
    pub async fn load(&self, aggregate_id: AdoptionId) -> Result<A, DomainError>
    where
        A::Event: for<'de> serde::Deserialize<'de>,
    {
        let events = self.store.events_for_aggregate(aggregate_id).await?;

        let mut aggregate = A::default();
        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_sequence(envelope.sequence);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AdoptionId) -> Result<Option<A>, DomainError>
    where
        A::Event: for<'de> serde::Deserialize<'de>,
    {
        let aggregate = self.load(aggregate_id).await?;
        if aggregate.id().is_some() {
            Ok(Some(aggregate))
        } else {
            Ok(None)
        }
    }

    /// Executes a command and persists the resulting events.
    ///
    /// The command function receives the current aggregate state and returns
    /// either a list of events to apply, or an error. An empty event list is
    /// an accepted no-op: nothing is persisted and the sequence is unchanged.
    ///
    /// On a `ConcurrencyConflict` the handler reloads and re-decides, up to
    /// `MAX_ATTEMPTS` times, before surfacing the conflict to the caller.
    pub async fn execute<F>(
        &self,
        aggregate_id: AdoptionId,
        actor: &Actor,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        A::Event: for<'de> serde::Deserialize<'de> + Serialize,
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_execute(aggregate_id, actor, &command_fn).await {
                Err(DomainError::EventStore(EventStoreError::ConcurrencyConflict {
                    ..
                })) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        aggregate_id = %aggregate_id,
                        attempt,
                        "concurrency conflict, retrying against fresh state"
                    );
                    metrics::counter!("command_concurrency_retries").increment(1);
                }
                result => return result,
            }
        }
    }

    async fn try_execute<F>(
        &self,
        aggregate_id: AdoptionId,
        actor: &Actor,
        command_fn: &F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        A::Event: for<'de> serde::Deserialize<'de> + Serialize,
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        let current_sequence = aggregate.sequence();

        // Execute command to get events
        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                event_ids: vec![],
                new_sequence: current_sequence,
            });
        }

        // Build envelopes for persistence
        let envelopes = self.build_envelopes(aggregate_id, current_sequence, actor, &events)?;
        let event_ids = envelopes.iter().map(|e| e.event_id).collect();

        // Persist events with optimistic concurrency
        let options = if current_sequence == Sequence::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_sequence(current_sequence)
        };

        let new_sequence = self.store.append(envelopes, options).await?;

        // Apply events to aggregate
        for event in &events {
            aggregate.apply(event.clone());
        }
        aggregate.set_sequence(new_sequence);

        Ok(CommandResult {
            aggregate,
            events,
            event_ids,
            new_sequence,
        })
    }

    /// Builds event envelopes from domain events.
    fn build_envelopes(
        &self,
        aggregate_id: AdoptionId,
        current_sequence: Sequence,
        actor: &Actor,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError>
    where
        A::Event: Serialize,
    {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut sequence = current_sequence;

        for event in events {
            sequence = sequence.next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .sequence(sequence)
                .actor(actor.clone())
                .payload(event)?
                .build();
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }
}
