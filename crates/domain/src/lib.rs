//! Domain layer for the adoption lifecycle engine.
//!
//! This crate provides the core domain abstractions including:
//! - Aggregate trait for event-sourced entities
//! - DomainEvent trait for domain events
//! - Command trait and CommandHandler for command processing
//! - Adoption aggregate implementation with phase state machine

pub mod adoption;
pub mod aggregate;
pub mod command;
pub mod error;

pub use adoption::{
    Adoption, AdoptionError, AdoptionEvent, AdoptionService, AdvanceStage,
    CompleteOnboardingAndStartEngagement, CompleteProcess, CompleteSaleAndStartOnboarding, Outcome,
    Phase, Process, ProcessCatalog, ProcessKind, RecordCloseSignal, ScheduleNextStep, SetMrr,
    SetOwner, SetPhase, SetSeats, SetTier, Stage, StartSale,
};
pub use aggregate::{Aggregate, DomainEvent};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
