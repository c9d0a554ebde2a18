//! Read-model projections for the adoption lifecycle engine.
//!
//! Projections fold committed events into queryable views. The
//! [`ProjectionProcessor`] drives catch-up over the global event log; each
//! view guards its rows with a per-aggregate sequence watermark so
//! redelivery is idempotent.

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::{CatchUpReport, ProjectionProcessor};
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{AdoptionRow, AdoptionsView, PhaseCount, StageCount, StageSummaryView};
