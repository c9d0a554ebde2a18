//! Adoption aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod phase;
mod process;
mod service;

pub use aggregate::Adoption;
pub use commands::*;
pub use events::{
    AdoptionEvent, CloseSignalRecordedData, EngagementStartedData, MrrChangedData,
    NextStepScheduledData, OnboardingStartedData, OwnerChangedData, PhaseChangedData,
    ProcessCompletedData, SaleStartedData, SeatsChangedData, StageAdvancedData, TierChangedData,
};
pub use phase::Phase;
pub use process::{Outcome, Process, ProcessCatalog, ProcessKind, Stage};
pub use service::AdoptionService;

use thiserror::Error;

/// Errors that can occur during adoption operations.
#[derive(Debug, Error)]
pub enum AdoptionError {
    /// No adoption exists for this pair; only `StartSale` creates one.
    #[error("Adoption not found: no sale has been started for this pair")]
    AdoptionNotFound,

    /// The adoption is not in a phase that allows the action.
    #[error("Invalid phase transition: cannot {action} from {current_phase} phase")]
    InvalidPhaseTransition {
        current_phase: Phase,
        action: &'static str,
    },

    /// The adoption has churned and no longer accepts changes.
    #[error("Adoption is churned: cannot {action}")]
    TerminalPhase { action: &'static str },

    /// The catalog has no process with this id.
    #[error("Process not found: {process_id}")]
    ProcessNotFound { process_id: String },

    /// The process has no stage with this id.
    #[error("Stage not found: {stage_id} in process {process_id}")]
    StageNotFound {
        process_id: String,
        stage_id: String,
    },

    /// The process is of the wrong kind for the command.
    #[error("Process {process_id} is not a {expected} process")]
    WrongProcessKind {
        process_id: String,
        expected: ProcessKind,
    },

    /// No process is currently active on the adoption.
    #[error("No active process")]
    NoActiveProcess,

    /// The adoption is not currently in the named process.
    #[error("Adoption is not in process {process_id}")]
    NotInProcess { process_id: String },

    /// The catalog defines no process of the required kind.
    #[error("No {kind} process is configured")]
    NoProcessOfKind { kind: ProcessKind },

    /// The process has no non-terminal stage to start in.
    #[error("Process {process_id} has no initial stage")]
    NoInitialStage { process_id: String },

    /// The process has no terminal stage marked with this outcome.
    #[error("Process {process_id} has no terminal stage for outcome {outcome}")]
    NoTerminalStage {
        process_id: String,
        outcome: Outcome,
    },

    /// A phase override requires a reason.
    #[error("A reason is required to change phase")]
    ReasonRequired,

    /// Churning requires a churn reason.
    #[error("A churn reason is required to move to the churned phase")]
    ChurnReasonRequired,

    /// MRR must be non-negative.
    #[error("Invalid MRR: {mrr_cents} cents (must be >= 0)")]
    InvalidMrr { mrr_cents: i64 },

    /// Close confidence must lie in 0.0..=1.0.
    #[error("Invalid close confidence: {value} (must be within 0.0..=1.0)")]
    InvalidCloseConfidence { value: f64 },
}
