//! The single command endpoint.
//!
//! All writes go through `POST /commands` as a tagged union. A successful
//! command runs a synchronous projector catch-up so the read side reflects
//! the write before the response returns.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use common::{Actor, ActorKind, AdoptionId, CompanyId, ProductId};
use domain::{
    Adoption, AdvanceStage, Aggregate, CompleteOnboardingAndStartEngagement, CompleteProcess,
    CompleteSaleAndStartOnboarding, CommandResult, DomainEvent, Outcome, Phase, RecordCloseSignal,
    ScheduleNextStep, SetMrr, SetOwner, SetPhase, SetSeats, SetTier, StartSale,
};
use event_store::EventStore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

use super::AppState;

/// The `(company, product, actor)` triple common to every command.
#[derive(Debug, Deserialize)]
pub struct CommandTarget {
    pub company_id: Uuid,
    pub product_id: Uuid,
    pub actor_id: String,
    pub actor_type: ActorKind,
}

impl CommandTarget {
    fn company_id(&self) -> CompanyId {
        CompanyId::from_uuid(self.company_id)
    }

    fn product_id(&self) -> ProductId {
        ProductId::from_uuid(self.product_id)
    }

    fn actor(&self) -> Actor {
        Actor::new(self.actor_type, self.actor_id.clone())
    }
}

/// POST /commands request body, dispatched on `action`.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CommandRequest {
    StartSale {
        #[serde(flatten)]
        target: CommandTarget,
        process_id: String,
        stage_id: Option<String>,
    },
    AdvanceStage {
        #[serde(flatten)]
        target: CommandTarget,
        to_stage_id: String,
    },
    SetPhase {
        #[serde(flatten)]
        target: CommandTarget,
        to_phase: Phase,
        reason: String,
        churn_reason: Option<String>,
    },
    SetOwner {
        #[serde(flatten)]
        target: CommandTarget,
        owner: String,
    },
    SetTier {
        #[serde(flatten)]
        target: CommandTarget,
        tier: String,
    },
    SetMrr {
        #[serde(flatten)]
        target: CommandTarget,
        mrr_cents: i64,
    },
    SetSeats {
        #[serde(flatten)]
        target: CommandTarget,
        seats: u32,
    },
    ScheduleNextStep {
        #[serde(flatten)]
        target: CommandTarget,
        due_at: DateTime<Utc>,
        note: Option<String>,
    },
    RecordCloseSignal {
        #[serde(flatten)]
        target: CommandTarget,
        close_confidence: f64,
        close_ready: bool,
    },
    CompleteProcess {
        #[serde(flatten)]
        target: CommandTarget,
        process_id: String,
        outcome: Outcome,
    },
    CompleteSaleAndStartOnboarding {
        #[serde(flatten)]
        target: CommandTarget,
    },
    CompleteOnboardingAndStartEngagement {
        #[serde(flatten)]
        target: CommandTarget,
    },
}

// -- Response types --

/// One persisted event of a command, in order.
#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub event_id: String,
    pub event_type: String,
    pub sequence: i64,
}

/// Outcome of the synchronous catch-up run after a command.
#[derive(Debug, Serialize)]
pub struct ProjectionSummary {
    pub events_processed: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    pub adoption_id: String,
    pub phase: Phase,
    pub steps: Vec<StepResponse>,
    pub projection: ProjectionSummary,
}

// -- Handler --

/// POST /commands — execute one command against an adoption.
#[tracing::instrument(skip(state, req))]
pub async fn execute<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let result = dispatch(&state, req).await?;

    let report = state.projection_processor.run_catch_up().await?;

    let adoption_id = result
        .aggregate
        .id()
        .map(|id| id.to_string())
        .unwrap_or_default();
    Ok(Json(CommandResponse {
        success: true,
        adoption_id,
        phase: result.aggregate.phase(),
        steps: steps_from(&result),
        projection: ProjectionSummary {
            events_processed: report.events_processed,
            duration_ms: report.duration.as_millis() as u64,
        },
    }))
}

async fn dispatch<S: EventStore + Clone + 'static>(
    state: &AppState<S>,
    req: CommandRequest,
) -> Result<CommandResult<Adoption>, ApiError> {
    let service = &state.adoption_service;
    let result = match req {
        CommandRequest::StartSale {
            target,
            process_id,
            stage_id,
        } => {
            let mut cmd = StartSale::new(
                target.company_id(),
                target.product_id(),
                target.actor(),
                process_id,
            );
            cmd.stage_id = stage_id;
            service.start_sale(cmd).await?
        }
        CommandRequest::AdvanceStage {
            target,
            to_stage_id,
        } => {
            service
                .advance_stage(AdvanceStage::new(
                    target.company_id(),
                    target.product_id(),
                    target.actor(),
                    to_stage_id,
                ))
                .await?
        }
        CommandRequest::SetPhase {
            target,
            to_phase,
            reason,
            churn_reason,
        } => {
            let mut cmd = SetPhase::new(
                target.company_id(),
                target.product_id(),
                target.actor(),
                to_phase,
                reason,
            );
            cmd.churn_reason = churn_reason;
            service.set_phase(cmd).await?
        }
        CommandRequest::SetOwner { target, owner } => {
            service
                .set_owner(SetOwner::new(
                    target.company_id(),
                    target.product_id(),
                    target.actor(),
                    owner,
                ))
                .await?
        }
        CommandRequest::SetTier { target, tier } => {
            service
                .set_tier(SetTier::new(
                    target.company_id(),
                    target.product_id(),
                    target.actor(),
                    tier,
                ))
                .await?
        }
        CommandRequest::SetMrr { target, mrr_cents } => {
            service
                .set_mrr(SetMrr::new(
                    target.company_id(),
                    target.product_id(),
                    target.actor(),
                    mrr_cents,
                ))
                .await?
        }
        CommandRequest::SetSeats { target, seats } => {
            service
                .set_seats(SetSeats::new(
                    target.company_id(),
                    target.product_id(),
                    target.actor(),
                    seats,
                ))
                .await?
        }
        CommandRequest::ScheduleNextStep {
            target,
            due_at,
            note,
        } => {
            service
                .schedule_next_step(ScheduleNextStep::new(
                    target.company_id(),
                    target.product_id(),
                    target.actor(),
                    due_at,
                    note,
                ))
                .await?
        }
        CommandRequest::RecordCloseSignal {
            target,
            close_confidence,
            close_ready,
        } => {
            service
                .record_close_signal(RecordCloseSignal::new(
                    target.company_id(),
                    target.product_id(),
                    target.actor(),
                    close_confidence,
                    close_ready,
                ))
                .await?
        }
        CommandRequest::CompleteProcess {
            target,
            process_id,
            outcome,
        } => {
            service
                .complete_process(CompleteProcess::new(
                    target.company_id(),
                    target.product_id(),
                    target.actor(),
                    process_id,
                    outcome,
                ))
                .await?
        }
        CommandRequest::CompleteSaleAndStartOnboarding { target } => {
            service
                .complete_sale_and_start_onboarding(CompleteSaleAndStartOnboarding::new(
                    target.company_id(),
                    target.product_id(),
                    target.actor(),
                ))
                .await?
        }
        CommandRequest::CompleteOnboardingAndStartEngagement { target } => {
            service
                .complete_onboarding_and_start_engagement(
                    CompleteOnboardingAndStartEngagement::new(
                        target.company_id(),
                        target.product_id(),
                        target.actor(),
                    ),
                )
                .await?
        }
    };
    Ok(result)
}

/// Maps a command result onto ordered per-step responses.
///
/// Events landed at consecutive sequences ending at `new_sequence`, so each
/// step's sequence can be reconstructed from its index.
fn steps_from(result: &CommandResult<Adoption>) -> Vec<StepResponse> {
    let first_sequence = result.new_sequence.as_i64() - result.events.len() as i64 + 1;
    result
        .events
        .iter()
        .zip(&result.event_ids)
        .enumerate()
        .map(|(i, (event, event_id))| StepResponse {
            event_id: event_id.to_string(),
            event_type: event.event_type().to_string(),
            sequence: first_sequence + i as i64,
        })
        .collect()
}

/// Parses a path segment as an adoption id.
pub fn parse_adoption_id(id: &str) -> Result<AdoptionId, ApiError> {
    let uuid =
        Uuid::parse_str(id).map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(AdoptionId::from_uuid(uuid))
}
