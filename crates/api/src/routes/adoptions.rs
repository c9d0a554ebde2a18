//! Adoption query endpoints backed by the read model.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use event_store::EventStore;
use projections::AdoptionRow;
use serde::Serialize;

use crate::error::ApiError;

use super::AppState;
use super::commands::parse_adoption_id;

/// GET /adoptions — list all adoptions from the read model.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<AdoptionRow>>, ApiError> {
    // Catch up first so reads reflect the latest committed events
    state.projection_processor.run_catch_up().await?;
    Ok(Json(state.adoptions.all().await))
}

/// GET /adoptions/:id — one adoption row.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<AdoptionRow>, ApiError> {
    let adoption_id = parse_adoption_id(&id)?;
    state.projection_processor.run_catch_up().await?;

    let row = state
        .adoptions
        .get(adoption_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Adoption {id} not found")))?;
    Ok(Json(row))
}

/// Response type for event envelope data.
#[derive(Serialize)]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub aggregate_id: String,
    pub sequence: i64,
    pub occurred_at: String,
    pub actor: common::Actor,
    pub payload: serde_json::Value,
}

/// GET /adoptions/:id/events — the full event history of an adoption.
#[tracing::instrument(skip(state))]
pub async fn events<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let adoption_id = parse_adoption_id(&id)?;

    let envelopes = state
        .event_store
        .events_for_aggregate(adoption_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if envelopes.is_empty() {
        return Err(ApiError::NotFound(format!("Adoption {id} not found")));
    }

    let responses: Vec<EventEnvelopeResponse> = envelopes
        .into_iter()
        .map(|e| EventEnvelopeResponse {
            event_id: e.event_id.to_string(),
            event_type: e.event_type,
            aggregate_id: e.aggregate_id.to_string(),
            sequence: e.sequence.as_i64(),
            occurred_at: e.occurred_at.to_rfc3339(),
            actor: e.actor,
            payload: e.payload,
        })
        .collect();

    Ok(Json(responses))
}
