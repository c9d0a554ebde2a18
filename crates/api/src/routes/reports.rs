//! Pipeline reporting endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::EventStore;
use projections::{PhaseCount, StageCount};

use crate::error::ApiError;

use super::AppState;

/// GET /reports/stages — adoption counts per process stage.
#[tracing::instrument(skip(state))]
pub async fn stages<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<StageCount>>, ApiError> {
    state.projection_processor.run_catch_up().await?;
    Ok(Json(state.stage_summary.stage_counts().await))
}

/// GET /reports/phases — adoption counts per lifecycle phase.
#[tracing::instrument(skip(state))]
pub async fn phases<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<PhaseCount>>, ApiError> {
    state.projection_processor.run_catch_up().await?;
    Ok(Json(state.stage_summary.phase_counts().await))
}
