//! HTTP route handlers.

pub mod adoptions;
pub mod commands;
pub mod health;
pub mod metrics;
pub mod reports;

use std::sync::Arc;

use domain::AdoptionService;
use event_store::EventStore;
use projections::{AdoptionsView, ProjectionProcessor, StageSummaryView};

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub adoption_service: AdoptionService<S>,
    pub adoptions: Arc<AdoptionsView>,
    pub stage_summary: Arc<StageSummaryView>,
    pub event_store: S,
    pub projection_processor: Arc<ProjectionProcessor<S>>,
}
