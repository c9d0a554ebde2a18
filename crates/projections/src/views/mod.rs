//! Concrete projections over the adoption event log.

pub mod adoptions;
pub mod stage_summary;

pub use adoptions::{AdoptionRow, AdoptionsView};
pub use stage_summary::{PhaseCount, StageCount, StageSummaryView};
