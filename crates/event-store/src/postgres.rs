use async_trait::async_trait;
use common::Actor;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AdoptionId, EventEnvelope, EventId, EventQuery, EventStoreError, Result, Sequence,
    SequencedEvent,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

const EVENT_COLUMNS: &str =
    "global_position, id, event_type, aggregate_id, aggregate_type, sequence, occurred_at, actor, payload";

/// PostgreSQL-backed event store implementation.
///
/// Events are keyed `(aggregate_id, sequence)` unique; a violation of that
/// constraint is surfaced as a `ConcurrencyConflict`. A `global_position`
/// serial column provides the commit-order cursor for catch-up scans.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_event(row: &PgRow) -> Result<EventEnvelope> {
        let actor_json: serde_json::Value = row.try_get("actor")?;
        let actor: Actor = serde_json::from_value(actor_json)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AdoptionId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            sequence: Sequence::new(row.try_get("sequence")?),
            occurred_at: row.try_get("occurred_at")?,
            actor,
            payload: row.try_get("payload")?,
        })
    }

    fn row_to_sequenced(row: PgRow) -> Result<SequencedEvent> {
        let position: i64 = row.try_get("global_position")?;
        let envelope = Self::row_to_event(&row)?;
        Ok(SequencedEvent {
            position: position as u64,
            envelope,
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Sequence> {
        validate_events_for_append(&events)?;

        let first_event = &events[0];
        let aggregate_id = first_event.aggregate_id;

        // One transaction for the whole batch: both-or-neither
        let mut tx = self.pool.begin().await?;

        if let Some(expected) = options.expected_sequence {
            let current: Option<i64> =
                sqlx::query_scalar("SELECT MAX(sequence) FROM events WHERE aggregate_id = $1")
                    .bind(aggregate_id.as_uuid())
                    .fetch_one(&mut *tx)
                    .await?;

            let actual = Sequence::new(current.unwrap_or(0));

            if actual != expected {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected,
                    actual,
                });
            }
        }

        let mut last_sequence = Sequence::initial();
        for event in &events {
            let actor_json = serde_json::to_value(&event.actor)?;

            sqlx::query(
                r#"
                INSERT INTO events (id, event_type, aggregate_id, aggregate_type, sequence, occurred_at, actor, payload)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(event.aggregate_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(event.sequence.as_i64())
            .bind(event.occurred_at)
            .bind(actor_json)
            .bind(&event.payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A unique-constraint violation means another writer won the race
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_aggregate_sequence")
                {
                    return EventStoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected: options.expected_sequence.unwrap_or(Sequence::initial()),
                        actual: event.sequence,
                    };
                }
                EventStoreError::Database(e)
            })?;

            last_sequence = event.sequence;
        }

        tx.commit().await?;
        metrics::counter!("event_store_events_appended").increment(events.len() as u64);
        Ok(last_sequence)
    }

    async fn events_for_aggregate(&self, aggregate_id: AdoptionId) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE aggregate_id = $1 ORDER BY sequence ASC"
        ))
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_event).collect()
    }

    async fn events_for_aggregate_from(
        &self,
        aggregate_id: AdoptionId,
        from_sequence: Sequence,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE aggregate_id = $1 AND sequence >= $2 ORDER BY sequence ASC"
        ))
        .bind(aggregate_id.as_uuid())
        .bind(from_sequence.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_event).collect()
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE 1=1");
        let mut param_count = 0;

        if query.aggregate_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND aggregate_id = ${param_count}"));
        }
        if query.event_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_type = ANY(${param_count})"));
        }
        if query.from_sequence.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND sequence >= ${param_count}"));
        }
        if query.to_sequence.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND sequence <= ${param_count}"));
        }
        if query.from_occurred_at.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND occurred_at >= ${param_count}"));
        }
        if query.to_occurred_at.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND occurred_at <= ${param_count}"));
        }

        sql.push_str(" ORDER BY global_position ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.aggregate_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(event_types) = query.event_types {
            sqlx_query = sqlx_query.bind(event_types);
        }
        if let Some(from_sequence) = query.from_sequence {
            sqlx_query = sqlx_query.bind(from_sequence.as_i64());
        }
        if let Some(to_sequence) = query.to_sequence {
            sqlx_query = sqlx_query.bind(to_sequence.as_i64());
        }
        if let Some(from_ts) = query.from_occurred_at {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_occurred_at {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_event).collect()
    }

    async fn stream_events_since(&self, cursor: u64) -> Result<EventStream> {
        use futures_util::StreamExt;

        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE global_position > $1 ORDER BY global_position ASC"
        );

        let pool = self.pool.clone();
        let stream = async_stream_rows(pool, sql, cursor as i64).map(|result| match result {
            Ok(row) => Self::row_to_sequenced(row),
            Err(e) => Err(EventStoreError::Database(e)),
        });

        Ok(Box::pin(stream))
    }

    async fn current_sequence(&self, aggregate_id: AdoptionId) -> Result<Option<Sequence>> {
        let sequence: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sequence) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(sequence.map(Sequence::new))
    }
}

/// Owned row stream over a pool-bound query with one i64 parameter.
fn async_stream_rows(
    pool: PgPool,
    sql: String,
    cursor: i64,
) -> impl futures_core::Stream<Item = std::result::Result<PgRow, sqlx::Error>> {
    use futures_util::StreamExt;

    futures_util::stream::once(async move {
        sqlx::query(&sql).bind(cursor).fetch_all(&pool).await
    })
    .flat_map(|result| match result {
        Ok(rows) => futures_util::stream::iter(rows.into_iter().map(Ok)).left_stream(),
        Err(e) => futures_util::stream::iter(vec![Err(e)]).right_stream(),
    })
}
