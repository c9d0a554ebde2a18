//! Adoption domain events.

use chrono::{DateTime, Utc};
use common::{AdoptionId, CompanyId, ProductId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{Outcome, Phase};

/// Events that can occur on an adoption aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AdoptionEvent {
    /// A sales process was started; the first event creates the aggregate.
    SaleStarted(SaleStartedData),

    /// An onboarding process was started.
    OnboardingStarted(OnboardingStartedData),

    /// An engagement process was started.
    EngagementStarted(EngagementStartedData),

    /// The adoption moved to a different stage within its current process.
    StageAdvanced(StageAdvancedData),

    /// The lifecycle phase was changed directly.
    PhaseChanged(PhaseChangedData),

    /// The owning account executive changed.
    OwnerChanged(OwnerChangedData),

    /// The pricing tier changed.
    TierChanged(TierChangedData),

    /// Monthly recurring revenue changed.
    MrrChanged(MrrChangedData),

    /// The licensed seat count changed.
    SeatsChanged(SeatsChangedData),

    /// A next step was scheduled.
    NextStepScheduled(NextStepScheduledData),

    /// A close-readiness signal was recorded.
    CloseSignalRecorded(CloseSignalRecordedData),

    /// The current process finished with an outcome.
    ProcessCompleted(ProcessCompletedData),
}

impl DomainEvent for AdoptionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AdoptionEvent::SaleStarted(_) => "SaleStarted",
            AdoptionEvent::OnboardingStarted(_) => "OnboardingStarted",
            AdoptionEvent::EngagementStarted(_) => "EngagementStarted",
            AdoptionEvent::StageAdvanced(_) => "StageAdvanced",
            AdoptionEvent::PhaseChanged(_) => "PhaseChanged",
            AdoptionEvent::OwnerChanged(_) => "OwnerChanged",
            AdoptionEvent::TierChanged(_) => "TierChanged",
            AdoptionEvent::MrrChanged(_) => "MrrChanged",
            AdoptionEvent::SeatsChanged(_) => "SeatsChanged",
            AdoptionEvent::NextStepScheduled(_) => "NextStepScheduled",
            AdoptionEvent::CloseSignalRecorded(_) => "CloseSignalRecorded",
            AdoptionEvent::ProcessCompleted(_) => "ProcessCompleted",
        }
    }
}

/// Data for SaleStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleStartedData {
    /// The adoption aggregate being created or re-entered.
    pub adoption_id: AdoptionId,

    /// The company side of the pair.
    pub company_id: CompanyId,

    /// The product side of the pair.
    pub product_id: ProductId,

    /// The sales process that started.
    pub process_id: String,

    /// The initial stage of the process.
    pub stage_id: String,

    /// When the sale started.
    pub started_at: DateTime<Utc>,
}

/// Data for OnboardingStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingStartedData {
    /// The onboarding process that started.
    pub process_id: String,

    /// The initial stage of the process.
    pub stage_id: String,

    /// When onboarding started.
    pub started_at: DateTime<Utc>,
}

/// Data for EngagementStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementStartedData {
    /// The engagement process that started.
    pub process_id: String,

    /// The initial stage of the process.
    pub stage_id: String,

    /// When engagement started.
    pub started_at: DateTime<Utc>,
}

/// Data for StageAdvanced event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageAdvancedData {
    /// The process the stage belongs to.
    pub process_id: String,

    /// The stage the adoption moved from.
    pub from_stage_id: Option<String>,

    /// The stage the adoption moved to.
    pub to_stage_id: String,

    /// When the move happened.
    pub moved_at: DateTime<Utc>,
}

/// Data for PhaseChanged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseChangedData {
    /// The phase before the change.
    pub from_phase: Phase,

    /// The phase after the change.
    pub to_phase: Phase,

    /// Why the phase was changed.
    pub reason: String,

    /// Required when the target phase is `churned`.
    pub churn_reason: Option<String>,

    /// When the change happened.
    pub changed_at: DateTime<Utc>,
}

/// Data for OwnerChanged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerChangedData {
    /// The previous owner, if any.
    pub old_owner: Option<String>,

    /// The new owner.
    pub new_owner: String,
}

/// Data for TierChanged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierChangedData {
    /// The previous tier, if any.
    pub old_tier: Option<String>,

    /// The new tier.
    pub new_tier: String,
}

/// Data for MrrChanged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MrrChangedData {
    /// The previous MRR in cents, if any.
    pub old_mrr_cents: Option<i64>,

    /// The new MRR in cents.
    pub new_mrr_cents: i64,
}

/// Data for SeatsChanged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatsChangedData {
    /// The previous seat count, if any.
    pub old_seats: Option<u32>,

    /// The new seat count.
    pub new_seats: u32,
}

/// Data for NextStepScheduled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextStepScheduledData {
    /// When the next step is due. A past date is valid and reads as overdue.
    pub due_at: DateTime<Utc>,

    /// Free-form description of the step.
    pub note: Option<String>,
}

/// Data for CloseSignalRecorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseSignalRecordedData {
    /// Confidence that the deal will close, in `0.0..=1.0`.
    pub close_confidence: f64,

    /// Whether the deal is judged ready to close.
    pub close_ready: bool,

    /// When the signal was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Data for ProcessCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessCompletedData {
    /// The process that completed.
    pub process_id: String,

    /// The outcome the process ended with.
    pub outcome: Outcome,

    /// The terminal stage that marked the outcome.
    pub final_stage_id: String,

    /// When the process completed.
    pub completed_at: DateTime<Utc>,
}

// Convenience constructors for events
impl AdoptionEvent {
    /// Creates a SaleStarted event.
    pub fn sale_started(
        adoption_id: AdoptionId,
        company_id: CompanyId,
        product_id: ProductId,
        process_id: impl Into<String>,
        stage_id: impl Into<String>,
    ) -> Self {
        AdoptionEvent::SaleStarted(SaleStartedData {
            adoption_id,
            company_id,
            product_id,
            process_id: process_id.into(),
            stage_id: stage_id.into(),
            started_at: Utc::now(),
        })
    }

    /// Creates an OnboardingStarted event.
    pub fn onboarding_started(process_id: impl Into<String>, stage_id: impl Into<String>) -> Self {
        AdoptionEvent::OnboardingStarted(OnboardingStartedData {
            process_id: process_id.into(),
            stage_id: stage_id.into(),
            started_at: Utc::now(),
        })
    }

    /// Creates an EngagementStarted event.
    pub fn engagement_started(process_id: impl Into<String>, stage_id: impl Into<String>) -> Self {
        AdoptionEvent::EngagementStarted(EngagementStartedData {
            process_id: process_id.into(),
            stage_id: stage_id.into(),
            started_at: Utc::now(),
        })
    }

    /// Creates a StageAdvanced event.
    pub fn stage_advanced(
        process_id: impl Into<String>,
        from_stage_id: Option<String>,
        to_stage_id: impl Into<String>,
    ) -> Self {
        AdoptionEvent::StageAdvanced(StageAdvancedData {
            process_id: process_id.into(),
            from_stage_id,
            to_stage_id: to_stage_id.into(),
            moved_at: Utc::now(),
        })
    }

    /// Creates a PhaseChanged event.
    pub fn phase_changed(
        from_phase: Phase,
        to_phase: Phase,
        reason: impl Into<String>,
        churn_reason: Option<String>,
    ) -> Self {
        AdoptionEvent::PhaseChanged(PhaseChangedData {
            from_phase,
            to_phase,
            reason: reason.into(),
            churn_reason,
            changed_at: Utc::now(),
        })
    }

    /// Creates an OwnerChanged event.
    pub fn owner_changed(old_owner: Option<String>, new_owner: impl Into<String>) -> Self {
        AdoptionEvent::OwnerChanged(OwnerChangedData {
            old_owner,
            new_owner: new_owner.into(),
        })
    }

    /// Creates a TierChanged event.
    pub fn tier_changed(old_tier: Option<String>, new_tier: impl Into<String>) -> Self {
        AdoptionEvent::TierChanged(TierChangedData {
            old_tier,
            new_tier: new_tier.into(),
        })
    }

    /// Creates an MrrChanged event.
    pub fn mrr_changed(old_mrr_cents: Option<i64>, new_mrr_cents: i64) -> Self {
        AdoptionEvent::MrrChanged(MrrChangedData {
            old_mrr_cents,
            new_mrr_cents,
        })
    }

    /// Creates a SeatsChanged event.
    pub fn seats_changed(old_seats: Option<u32>, new_seats: u32) -> Self {
        AdoptionEvent::SeatsChanged(SeatsChangedData {
            old_seats,
            new_seats,
        })
    }

    /// Creates a NextStepScheduled event.
    pub fn next_step_scheduled(due_at: DateTime<Utc>, note: Option<String>) -> Self {
        AdoptionEvent::NextStepScheduled(NextStepScheduledData { due_at, note })
    }

    /// Creates a CloseSignalRecorded event.
    pub fn close_signal_recorded(close_confidence: f64, close_ready: bool) -> Self {
        AdoptionEvent::CloseSignalRecorded(CloseSignalRecordedData {
            close_confidence,
            close_ready,
            recorded_at: Utc::now(),
        })
    }

    /// Creates a ProcessCompleted event.
    pub fn process_completed(
        process_id: impl Into<String>,
        outcome: Outcome,
        final_stage_id: impl Into<String>,
    ) -> Self {
        AdoptionEvent::ProcessCompleted(ProcessCompletedData {
            process_id: process_id.into(),
            outcome,
            final_stage_id: final_stage_id.into(),
            completed_at: Utc::now(),
        })
    }
}
