//! Adoption commands.
//!
//! Every command addresses its aggregate by the `(company_id, product_id)`
//! pair; the aggregate id is derived deterministically from it.

use chrono::{DateTime, Utc};
use common::{Actor, AdoptionId, CompanyId, ProductId};

use crate::command::Command;

use super::{Adoption, Outcome, Phase};

macro_rules! impl_adoption_command {
    ($name:ident) => {
        impl Command for $name {
            type Aggregate = Adoption;

            fn aggregate_id(&self) -> AdoptionId {
                AdoptionId::derive(self.company_id, self.product_id)
            }

            fn actor(&self) -> &Actor {
                &self.actor
            }
        }
    };
}

/// Command to start a sales process.
#[derive(Debug, Clone)]
pub struct StartSale {
    /// The company side of the pair.
    pub company_id: CompanyId,

    /// The product side of the pair.
    pub product_id: ProductId,

    /// Who is issuing the command.
    pub actor: Actor,

    /// The sales process to run.
    pub process_id: String,

    /// The initial stage; defaults to the process's first stage.
    pub stage_id: Option<String>,
}

impl StartSale {
    /// Creates a new StartSale command.
    pub fn new(
        company_id: CompanyId,
        product_id: ProductId,
        actor: Actor,
        process_id: impl Into<String>,
    ) -> Self {
        Self {
            company_id,
            product_id,
            actor,
            process_id: process_id.into(),
            stage_id: None,
        }
    }

    /// Sets an explicit initial stage.
    pub fn at_stage(mut self, stage_id: impl Into<String>) -> Self {
        self.stage_id = Some(stage_id.into());
        self
    }
}

impl_adoption_command!(StartSale);

/// Command to move the adoption to another stage of its current process.
#[derive(Debug, Clone)]
pub struct AdvanceStage {
    /// The company side of the pair.
    pub company_id: CompanyId,

    /// The product side of the pair.
    pub product_id: ProductId,

    /// Who is issuing the command.
    pub actor: Actor,

    /// The target stage.
    pub to_stage_id: String,
}

impl AdvanceStage {
    /// Creates a new AdvanceStage command.
    pub fn new(
        company_id: CompanyId,
        product_id: ProductId,
        actor: Actor,
        to_stage_id: impl Into<String>,
    ) -> Self {
        Self {
            company_id,
            product_id,
            actor,
            to_stage_id: to_stage_id.into(),
        }
    }
}

impl_adoption_command!(AdvanceStage);

/// Command to force the lifecycle phase directly.
#[derive(Debug, Clone)]
pub struct SetPhase {
    /// The company side of the pair.
    pub company_id: CompanyId,

    /// The product side of the pair.
    pub product_id: ProductId,

    /// Who is issuing the command.
    pub actor: Actor,

    /// The target phase.
    pub to_phase: Phase,

    /// Why the override is being made.
    pub reason: String,

    /// Required when the target phase is `churned`.
    pub churn_reason: Option<String>,
}

impl SetPhase {
    /// Creates a new SetPhase command.
    pub fn new(
        company_id: CompanyId,
        product_id: ProductId,
        actor: Actor,
        to_phase: Phase,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            company_id,
            product_id,
            actor,
            to_phase,
            reason: reason.into(),
            churn_reason: None,
        }
    }

    /// Attaches a churn reason.
    pub fn with_churn_reason(mut self, churn_reason: impl Into<String>) -> Self {
        self.churn_reason = Some(churn_reason.into());
        self
    }
}

impl_adoption_command!(SetPhase);

/// Command to change the owning account executive.
#[derive(Debug, Clone)]
pub struct SetOwner {
    /// The company side of the pair.
    pub company_id: CompanyId,

    /// The product side of the pair.
    pub product_id: ProductId,

    /// Who is issuing the command.
    pub actor: Actor,

    /// The new owner.
    pub owner: String,
}

impl SetOwner {
    /// Creates a new SetOwner command.
    pub fn new(
        company_id: CompanyId,
        product_id: ProductId,
        actor: Actor,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            company_id,
            product_id,
            actor,
            owner: owner.into(),
        }
    }
}

impl_adoption_command!(SetOwner);

/// Command to change the pricing tier.
#[derive(Debug, Clone)]
pub struct SetTier {
    /// The company side of the pair.
    pub company_id: CompanyId,

    /// The product side of the pair.
    pub product_id: ProductId,

    /// Who is issuing the command.
    pub actor: Actor,

    /// The new tier.
    pub tier: String,
}

impl SetTier {
    /// Creates a new SetTier command.
    pub fn new(
        company_id: CompanyId,
        product_id: ProductId,
        actor: Actor,
        tier: impl Into<String>,
    ) -> Self {
        Self {
            company_id,
            product_id,
            actor,
            tier: tier.into(),
        }
    }
}

impl_adoption_command!(SetTier);

/// Command to change monthly recurring revenue.
#[derive(Debug, Clone)]
pub struct SetMrr {
    /// The company side of the pair.
    pub company_id: CompanyId,

    /// The product side of the pair.
    pub product_id: ProductId,

    /// Who is issuing the command.
    pub actor: Actor,

    /// The new MRR in cents. Must be non-negative.
    pub mrr_cents: i64,
}

impl SetMrr {
    /// Creates a new SetMrr command.
    pub fn new(company_id: CompanyId, product_id: ProductId, actor: Actor, mrr_cents: i64) -> Self {
        Self {
            company_id,
            product_id,
            actor,
            mrr_cents,
        }
    }
}

impl_adoption_command!(SetMrr);

/// Command to change the licensed seat count.
#[derive(Debug, Clone)]
pub struct SetSeats {
    /// The company side of the pair.
    pub company_id: CompanyId,

    /// The product side of the pair.
    pub product_id: ProductId,

    /// Who is issuing the command.
    pub actor: Actor,

    /// The new seat count.
    pub seats: u32,
}

impl SetSeats {
    /// Creates a new SetSeats command.
    pub fn new(company_id: CompanyId, product_id: ProductId, actor: Actor, seats: u32) -> Self {
        Self {
            company_id,
            product_id,
            actor,
            seats,
        }
    }
}

impl_adoption_command!(SetSeats);

/// Command to schedule the next step.
#[derive(Debug, Clone)]
pub struct ScheduleNextStep {
    /// The company side of the pair.
    pub company_id: CompanyId,

    /// The product side of the pair.
    pub product_id: ProductId,

    /// Who is issuing the command.
    pub actor: Actor,

    /// When the step is due. Past dates are valid (overdue).
    pub due_at: DateTime<Utc>,

    /// Free-form description of the step.
    pub note: Option<String>,
}

impl ScheduleNextStep {
    /// Creates a new ScheduleNextStep command.
    pub fn new(
        company_id: CompanyId,
        product_id: ProductId,
        actor: Actor,
        due_at: DateTime<Utc>,
        note: Option<String>,
    ) -> Self {
        Self {
            company_id,
            product_id,
            actor,
            due_at,
            note,
        }
    }
}

impl_adoption_command!(ScheduleNextStep);

/// Command to record a close-readiness signal.
#[derive(Debug, Clone)]
pub struct RecordCloseSignal {
    /// The company side of the pair.
    pub company_id: CompanyId,

    /// The product side of the pair.
    pub product_id: ProductId,

    /// Who is issuing the command; typically an `ai` actor.
    pub actor: Actor,

    /// Confidence that the deal will close, in `0.0..=1.0`.
    pub close_confidence: f64,

    /// Whether the deal is judged ready to close.
    pub close_ready: bool,
}

impl RecordCloseSignal {
    /// Creates a new RecordCloseSignal command.
    pub fn new(
        company_id: CompanyId,
        product_id: ProductId,
        actor: Actor,
        close_confidence: f64,
        close_ready: bool,
    ) -> Self {
        Self {
            company_id,
            product_id,
            actor,
            close_confidence,
            close_ready,
        }
    }
}

impl_adoption_command!(RecordCloseSignal);

/// Command to complete the current process with an outcome.
#[derive(Debug, Clone)]
pub struct CompleteProcess {
    /// The company side of the pair.
    pub company_id: CompanyId,

    /// The product side of the pair.
    pub product_id: ProductId,

    /// Who is issuing the command.
    pub actor: Actor,

    /// The process being completed; must be the current one.
    pub process_id: String,

    /// The outcome to complete with.
    pub outcome: Outcome,
}

impl CompleteProcess {
    /// Creates a new CompleteProcess command.
    pub fn new(
        company_id: CompanyId,
        product_id: ProductId,
        actor: Actor,
        process_id: impl Into<String>,
        outcome: Outcome,
    ) -> Self {
        Self {
            company_id,
            product_id,
            actor,
            process_id: process_id.into(),
            outcome,
        }
    }
}

impl_adoption_command!(CompleteProcess);

/// Compound command: complete the sales process as won and start onboarding
/// as one atomic batch.
#[derive(Debug, Clone)]
pub struct CompleteSaleAndStartOnboarding {
    /// The company side of the pair.
    pub company_id: CompanyId,

    /// The product side of the pair.
    pub product_id: ProductId,

    /// Who is issuing the command.
    pub actor: Actor,
}

impl CompleteSaleAndStartOnboarding {
    /// Creates a new CompleteSaleAndStartOnboarding command.
    pub fn new(company_id: CompanyId, product_id: ProductId, actor: Actor) -> Self {
        Self {
            company_id,
            product_id,
            actor,
        }
    }
}

impl_adoption_command!(CompleteSaleAndStartOnboarding);

/// Compound command: complete onboarding and start engagement as one atomic
/// batch.
#[derive(Debug, Clone)]
pub struct CompleteOnboardingAndStartEngagement {
    /// The company side of the pair.
    pub company_id: CompanyId,

    /// The product side of the pair.
    pub product_id: ProductId,

    /// Who is issuing the command.
    pub actor: Actor,
}

impl CompleteOnboardingAndStartEngagement {
    /// Creates a new CompleteOnboardingAndStartEngagement command.
    pub fn new(company_id: CompanyId, product_id: ProductId, actor: Actor) -> Self {
        Self {
            company_id,
            product_id,
            actor,
        }
    }
}

impl_adoption_command!(CompleteOnboardingAndStartEngagement);
