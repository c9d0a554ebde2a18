//! HTTP API server with observability for the adoption lifecycle engine.
//!
//! Exposes a single command endpoint plus read-model queries and reports,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{AdoptionService, ProcessCatalog};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{AdoptionsView, ProjectionProcessor, StageSummaryView};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/commands", post(routes::commands::execute::<S>))
        .route("/adoptions", get(routes::adoptions::list::<S>))
        .route("/adoptions/{id}", get(routes::adoptions::get::<S>))
        .route("/adoptions/{id}/events", get(routes::adoptions::events::<S>))
        .route("/reports/stages", get(routes::reports::stages::<S>))
        .route("/reports/phases", get(routes::reports::phases::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state: service, views, and projector.
pub fn create_state<S: EventStore + Clone + 'static>(
    event_store: S,
    catalog: Arc<ProcessCatalog>,
) -> (Arc<AppState<S>>, Arc<ProjectionProcessor<S>>) {
    let adoption_service = AdoptionService::new(event_store.clone(), catalog);

    let adoptions = Arc::new(AdoptionsView::new());
    let stage_summary = Arc::new(StageSummaryView::new());

    let mut processor = ProjectionProcessor::new(Arc::new(event_store.clone()));
    processor.register(adoptions.clone());
    processor.register(stage_summary.clone());
    let processor = Arc::new(processor);

    let state = Arc::new(AppState {
        adoption_service,
        adoptions,
        stage_summary,
        event_store,
        projection_processor: processor.clone(),
    });

    (state, processor)
}

/// Creates the application state with the built-in standard catalog.
pub fn create_default_state<S: EventStore + Clone + 'static>(
    event_store: S,
) -> (Arc<AppState<S>>, Arc<ProjectionProcessor<S>>) {
    create_state(event_store, Arc::new(ProcessCatalog::standard()))
}
