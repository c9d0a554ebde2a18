//! Adoption aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AdoptionId, CompanyId, ProductId};
use event_store::Sequence;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    AdoptionError, AdoptionEvent, Outcome, Phase, ProcessCatalog, ProcessKind,
    events::{
        CloseSignalRecordedData, EngagementStartedData, OnboardingStartedData, ProcessCompletedData,
        SaleStartedData, StageAdvancedData,
    },
};

/// Adoption aggregate root.
///
/// One company's relationship with one product across its whole lifecycle,
/// from the first sales touch to churn. Created implicitly by the first
/// `StartSale`; never deleted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Adoption {
    /// Deterministic identifier derived from `(company_id, product_id)`.
    id: Option<AdoptionId>,

    /// Current sequence for optimistic concurrency.
    #[serde(default)]
    sequence: Sequence,

    /// The company side of the pair.
    company_id: Option<CompanyId>,

    /// The product side of the pair.
    product_id: Option<ProductId>,

    /// Current lifecycle phase.
    phase: Phase,

    /// The process currently running, if any.
    current_process_id: Option<String>,

    /// The stage within the current process.
    current_stage_id: Option<String>,

    /// When the current stage was entered.
    stage_entered_at: Option<DateTime<Utc>>,

    /// When the adoption last moved between stages.
    last_stage_moved_at: Option<DateTime<Utc>>,

    /// Owning account executive.
    owner: Option<String>,

    /// Pricing tier.
    tier: Option<String>,

    /// Monthly recurring revenue in cents.
    mrr_cents: Option<i64>,

    /// Licensed seat count.
    seats: Option<u32>,

    /// When the next step is due.
    next_step_due_at: Option<DateTime<Utc>>,

    /// Note attached to the next step.
    next_step_note: Option<String>,

    /// Latest close-confidence signal.
    close_confidence: Option<f64>,

    /// Latest close-readiness judgement.
    close_ready: Option<bool>,

    /// Outcome of the most recently completed process.
    last_outcome: Option<Outcome>,
}

impl Aggregate for Adoption {
    type Event = AdoptionEvent;
    type Error = AdoptionError;

    fn aggregate_type() -> &'static str {
        "Adoption"
    }

    fn id(&self) -> Option<AdoptionId> {
        self.id
    }

    fn sequence(&self) -> Sequence {
        self.sequence
    }

    fn set_sequence(&mut self, sequence: Sequence) {
        self.sequence = sequence;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            AdoptionEvent::SaleStarted(data) => self.apply_sale_started(data),
            AdoptionEvent::OnboardingStarted(data) => self.apply_onboarding_started(data),
            AdoptionEvent::EngagementStarted(data) => self.apply_engagement_started(data),
            AdoptionEvent::StageAdvanced(data) => self.apply_stage_advanced(data),
            AdoptionEvent::PhaseChanged(data) => {
                self.phase = data.to_phase;
            }
            AdoptionEvent::OwnerChanged(data) => {
                self.owner = Some(data.new_owner);
            }
            AdoptionEvent::TierChanged(data) => {
                self.tier = Some(data.new_tier);
            }
            AdoptionEvent::MrrChanged(data) => {
                self.mrr_cents = Some(data.new_mrr_cents);
            }
            AdoptionEvent::SeatsChanged(data) => {
                self.seats = Some(data.new_seats);
            }
            AdoptionEvent::NextStepScheduled(data) => {
                self.next_step_due_at = Some(data.due_at);
                self.next_step_note = data.note;
            }
            AdoptionEvent::CloseSignalRecorded(data) => self.apply_close_signal(data),
            AdoptionEvent::ProcessCompleted(data) => self.apply_process_completed(data),
        }
    }
}

// Query methods
impl Adoption {
    /// Returns the company side of the pair.
    pub fn company_id(&self) -> Option<CompanyId> {
        self.company_id
    }

    /// Returns the product side of the pair.
    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the currently running process id, if any.
    pub fn current_process_id(&self) -> Option<&str> {
        self.current_process_id.as_deref()
    }

    /// Returns the current stage id, if any.
    pub fn current_stage_id(&self) -> Option<&str> {
        self.current_stage_id.as_deref()
    }

    /// Returns when the current stage was entered.
    pub fn stage_entered_at(&self) -> Option<DateTime<Utc>> {
        self.stage_entered_at
    }

    /// Returns when the adoption last moved between stages.
    pub fn last_stage_moved_at(&self) -> Option<DateTime<Utc>> {
        self.last_stage_moved_at
    }

    /// Returns the owning account executive.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Returns the pricing tier.
    pub fn tier(&self) -> Option<&str> {
        self.tier.as_deref()
    }

    /// Returns MRR in cents.
    pub fn mrr_cents(&self) -> Option<i64> {
        self.mrr_cents
    }

    /// Returns the seat count.
    pub fn seats(&self) -> Option<u32> {
        self.seats
    }

    /// Returns when the next step is due.
    pub fn next_step_due_at(&self) -> Option<DateTime<Utc>> {
        self.next_step_due_at
    }

    /// Returns the latest close confidence.
    pub fn close_confidence(&self) -> Option<f64> {
        self.close_confidence
    }

    /// Returns the latest close-readiness judgement.
    pub fn close_ready(&self) -> Option<bool> {
        self.close_ready
    }

    /// Returns the outcome of the most recently completed process.
    pub fn last_outcome(&self) -> Option<Outcome> {
        self.last_outcome
    }

    /// Returns true if the adoption is in the terminal phase.
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    fn require_exists(&self) -> Result<(), AdoptionError> {
        if self.id.is_none() {
            Err(AdoptionError::AdoptionNotFound)
        } else {
            Ok(())
        }
    }

    fn require_mutable(&self, action: &'static str) -> Result<(), AdoptionError> {
        self.require_exists()?;
        if !self.phase.can_mutate_attributes() {
            Err(AdoptionError::TerminalPhase { action })
        } else {
            Ok(())
        }
    }
}

// Command methods (pure decisions returning events)
impl Adoption {
    /// Starts a sales process, creating the aggregate on first use.
    ///
    /// Legal only from `prospect`, which also covers re-entry after a forced
    /// phase override returned the adoption there.
    pub fn start_sale(
        &self,
        adoption_id: AdoptionId,
        company_id: CompanyId,
        product_id: ProductId,
        catalog: &ProcessCatalog,
        process_id: &str,
        stage_id: Option<&str>,
    ) -> Result<Vec<AdoptionEvent>, AdoptionError> {
        if !self.phase.can_start_sale() {
            return Err(AdoptionError::InvalidPhaseTransition {
                current_phase: self.phase,
                action: "start sale",
            });
        }

        let process = catalog
            .process(process_id)
            .ok_or_else(|| AdoptionError::ProcessNotFound {
                process_id: process_id.to_string(),
            })?;

        if process.kind != ProcessKind::Sales {
            return Err(AdoptionError::WrongProcessKind {
                process_id: process_id.to_string(),
                expected: ProcessKind::Sales,
            });
        }

        let stage_id = match stage_id {
            Some(stage_id) => {
                if !process.contains_stage(stage_id) {
                    return Err(AdoptionError::StageNotFound {
                        process_id: process_id.to_string(),
                        stage_id: stage_id.to_string(),
                    });
                }
                stage_id.to_string()
            }
            None => {
                process
                    .first_stage()
                    .ok_or_else(|| AdoptionError::NoInitialStage {
                        process_id: process_id.to_string(),
                    })?
                    .id
                    .clone()
            }
        };

        Ok(vec![AdoptionEvent::sale_started(
            adoption_id,
            company_id,
            product_id,
            process_id,
            stage_id,
        )])
    }

    /// Moves the adoption to another stage of its current process.
    ///
    /// The target must belong to the current process. Moving to the stage the
    /// adoption is already in is an accepted no-op; moving to a lower-order
    /// stage (regression) is legal.
    pub fn advance_stage(
        &self,
        catalog: &ProcessCatalog,
        to_stage_id: &str,
    ) -> Result<Vec<AdoptionEvent>, AdoptionError> {
        self.require_exists()?;

        let process_id = self
            .current_process_id
            .as_deref()
            .ok_or(AdoptionError::NoActiveProcess)?;

        let process = catalog
            .process(process_id)
            .ok_or_else(|| AdoptionError::ProcessNotFound {
                process_id: process_id.to_string(),
            })?;

        if !process.contains_stage(to_stage_id) {
            return Err(AdoptionError::StageNotFound {
                process_id: process_id.to_string(),
                stage_id: to_stage_id.to_string(),
            });
        }

        if self.current_stage_id.as_deref() == Some(to_stage_id) {
            return Ok(vec![]);
        }

        Ok(vec![AdoptionEvent::stage_advanced(
            process_id,
            self.current_stage_id.clone(),
            to_stage_id,
        )])
    }

    /// Forces the lifecycle phase directly.
    ///
    /// Requires a reason; moving to `churned` additionally requires a churn
    /// reason. Setting the current phase again is a no-op.
    pub fn set_phase(
        &self,
        to_phase: Phase,
        reason: &str,
        churn_reason: Option<&str>,
    ) -> Result<Vec<AdoptionEvent>, AdoptionError> {
        self.require_exists()?;

        if reason.trim().is_empty() {
            return Err(AdoptionError::ReasonRequired);
        }

        if to_phase == self.phase {
            return Ok(vec![]);
        }

        if to_phase == Phase::Churned && churn_reason.is_none_or(|r| r.trim().is_empty()) {
            return Err(AdoptionError::ChurnReasonRequired);
        }

        Ok(vec![AdoptionEvent::phase_changed(
            self.phase,
            to_phase,
            reason,
            churn_reason.map(str::to_string),
        )])
    }

    /// Changes the owning account executive.
    pub fn set_owner(&self, owner: &str) -> Result<Vec<AdoptionEvent>, AdoptionError> {
        self.require_mutable("change owner")?;

        if self.owner.as_deref() == Some(owner) {
            return Ok(vec![]);
        }

        Ok(vec![AdoptionEvent::owner_changed(self.owner.clone(), owner)])
    }

    /// Changes the pricing tier.
    pub fn set_tier(&self, tier: &str) -> Result<Vec<AdoptionEvent>, AdoptionError> {
        self.require_mutable("change tier")?;

        if self.tier.as_deref() == Some(tier) {
            return Ok(vec![]);
        }

        Ok(vec![AdoptionEvent::tier_changed(self.tier.clone(), tier)])
    }

    /// Changes MRR, in cents. Must be non-negative.
    pub fn set_mrr(&self, mrr_cents: i64) -> Result<Vec<AdoptionEvent>, AdoptionError> {
        self.require_mutable("change MRR")?;

        if mrr_cents < 0 {
            return Err(AdoptionError::InvalidMrr { mrr_cents });
        }

        if self.mrr_cents == Some(mrr_cents) {
            return Ok(vec![]);
        }

        Ok(vec![AdoptionEvent::mrr_changed(self.mrr_cents, mrr_cents)])
    }

    /// Changes the licensed seat count.
    pub fn set_seats(&self, seats: u32) -> Result<Vec<AdoptionEvent>, AdoptionError> {
        self.require_mutable("change seats")?;

        if self.seats == Some(seats) {
            return Ok(vec![]);
        }

        Ok(vec![AdoptionEvent::seats_changed(self.seats, seats)])
    }

    /// Schedules the next step. Past due dates are valid and read as overdue.
    pub fn schedule_next_step(
        &self,
        due_at: DateTime<Utc>,
        note: Option<&str>,
    ) -> Result<Vec<AdoptionEvent>, AdoptionError> {
        self.require_mutable("schedule next step")?;

        if self.next_step_due_at == Some(due_at) && self.next_step_note.as_deref() == note {
            return Ok(vec![]);
        }

        Ok(vec![AdoptionEvent::next_step_scheduled(
            due_at,
            note.map(str::to_string),
        )])
    }

    /// Records a close-readiness signal, typically from the AI enrichment
    /// pipeline acting through the command layer.
    pub fn record_close_signal(
        &self,
        close_confidence: f64,
        close_ready: bool,
    ) -> Result<Vec<AdoptionEvent>, AdoptionError> {
        self.require_mutable("record close signal")?;

        if !(0.0..=1.0).contains(&close_confidence) || close_confidence.is_nan() {
            return Err(AdoptionError::InvalidCloseConfidence {
                value: close_confidence,
            });
        }

        if self.close_confidence == Some(close_confidence) && self.close_ready == Some(close_ready)
        {
            return Ok(vec![]);
        }

        Ok(vec![AdoptionEvent::close_signal_recorded(
            close_confidence,
            close_ready,
        )])
    }

    /// Completes the named process with an outcome.
    ///
    /// Legal only while the adoption is in that process, and only with an
    /// outcome the process has a terminal stage for. Emits `ProcessCompleted`
    /// and, where catalog policy dictates, a `PhaseChanged`.
    pub fn complete_process(
        &self,
        catalog: &ProcessCatalog,
        process_id: &str,
        outcome: Outcome,
    ) -> Result<Vec<AdoptionEvent>, AdoptionError> {
        self.require_exists()?;

        let current = self
            .current_process_id
            .as_deref()
            .ok_or(AdoptionError::NoActiveProcess)?;

        if current != process_id {
            return Err(AdoptionError::NotInProcess {
                process_id: process_id.to_string(),
            });
        }

        let process = catalog
            .process(process_id)
            .ok_or_else(|| AdoptionError::ProcessNotFound {
                process_id: process_id.to_string(),
            })?;

        let final_stage =
            process
                .terminal_stage_for(outcome)
                .ok_or_else(|| AdoptionError::NoTerminalStage {
                    process_id: process_id.to_string(),
                    outcome,
                })?;

        let mut events = vec![AdoptionEvent::process_completed(
            process_id,
            outcome,
            final_stage.id.clone(),
        )];

        if let Some(to_phase) = catalog.phase_after(process.kind, outcome)
            && to_phase != self.phase
        {
            let reason = format!("process {process_id} completed with outcome {outcome}");
            let churn_reason = (to_phase == Phase::Churned).then(|| reason.clone());
            events.push(AdoptionEvent::phase_changed(
                self.phase,
                to_phase,
                reason,
                churn_reason,
            ));
        }

        Ok(events)
    }

    /// Completes the current sales process as won and starts onboarding, as
    /// one atomic batch. The `OnboardingStarted` event carries the phase
    /// semantics, so no separate `PhaseChanged` is emitted.
    pub fn complete_sale_and_start_onboarding(
        &self,
        catalog: &ProcessCatalog,
    ) -> Result<Vec<AdoptionEvent>, AdoptionError> {
        let sales = self.current_process_of_kind(catalog, ProcessKind::Sales)?;

        let final_stage = sales.terminal_stage_for(Outcome::Won).ok_or_else(|| {
            AdoptionError::NoTerminalStage {
                process_id: sales.id.clone(),
                outcome: Outcome::Won,
            }
        })?;

        let onboarding = catalog
            .process_of_kind(ProcessKind::Onboarding)
            .ok_or(AdoptionError::NoProcessOfKind {
                kind: ProcessKind::Onboarding,
            })?;

        let initial =
            onboarding
                .first_stage()
                .ok_or_else(|| AdoptionError::NoInitialStage {
                    process_id: onboarding.id.clone(),
                })?;

        Ok(vec![
            AdoptionEvent::process_completed(sales.id.clone(), Outcome::Won, final_stage.id.clone()),
            AdoptionEvent::onboarding_started(onboarding.id.clone(), initial.id.clone()),
        ])
    }

    /// Completes the current onboarding process and starts engagement, as one
    /// atomic batch. The `EngagementStarted` event moves the phase to
    /// `active`.
    pub fn complete_onboarding_and_start_engagement(
        &self,
        catalog: &ProcessCatalog,
    ) -> Result<Vec<AdoptionEvent>, AdoptionError> {
        let onboarding = self.current_process_of_kind(catalog, ProcessKind::Onboarding)?;

        let final_stage = onboarding
            .terminal_stage_for(Outcome::Completed)
            .ok_or_else(|| AdoptionError::NoTerminalStage {
                process_id: onboarding.id.clone(),
                outcome: Outcome::Completed,
            })?;

        let engagement = catalog
            .process_of_kind(ProcessKind::Engagement)
            .ok_or(AdoptionError::NoProcessOfKind {
                kind: ProcessKind::Engagement,
            })?;

        let initial =
            engagement
                .first_stage()
                .ok_or_else(|| AdoptionError::NoInitialStage {
                    process_id: engagement.id.clone(),
                })?;

        Ok(vec![
            AdoptionEvent::process_completed(
                onboarding.id.clone(),
                Outcome::Completed,
                final_stage.id.clone(),
            ),
            AdoptionEvent::engagement_started(engagement.id.clone(), initial.id.clone()),
        ])
    }

    fn current_process_of_kind<'a>(
        &self,
        catalog: &'a ProcessCatalog,
        kind: ProcessKind,
    ) -> Result<&'a super::Process, AdoptionError> {
        self.require_exists()?;

        let process_id = self
            .current_process_id
            .as_deref()
            .ok_or(AdoptionError::NoActiveProcess)?;

        let process = catalog
            .process(process_id)
            .ok_or_else(|| AdoptionError::ProcessNotFound {
                process_id: process_id.to_string(),
            })?;

        if process.kind != kind {
            return Err(AdoptionError::WrongProcessKind {
                process_id: process_id.to_string(),
                expected: kind,
            });
        }

        Ok(process)
    }
}

// Apply event helpers
impl Adoption {
    fn apply_sale_started(&mut self, data: SaleStartedData) {
        self.id = Some(data.adoption_id);
        self.company_id = Some(data.company_id);
        self.product_id = Some(data.product_id);
        self.phase = Phase::InSales;
        self.current_process_id = Some(data.process_id);
        self.current_stage_id = Some(data.stage_id);
        self.stage_entered_at = Some(data.started_at);
        self.last_stage_moved_at = Some(data.started_at);
    }

    fn apply_onboarding_started(&mut self, data: OnboardingStartedData) {
        self.phase = Phase::Onboarding;
        self.current_process_id = Some(data.process_id);
        self.current_stage_id = Some(data.stage_id);
        self.stage_entered_at = Some(data.started_at);
        self.last_stage_moved_at = Some(data.started_at);
    }

    fn apply_engagement_started(&mut self, data: EngagementStartedData) {
        self.phase = Phase::Active;
        self.current_process_id = Some(data.process_id);
        self.current_stage_id = Some(data.stage_id);
        self.stage_entered_at = Some(data.started_at);
        self.last_stage_moved_at = Some(data.started_at);
    }

    fn apply_stage_advanced(&mut self, data: StageAdvancedData) {
        self.current_stage_id = Some(data.to_stage_id);
        self.stage_entered_at = Some(data.moved_at);
        self.last_stage_moved_at = Some(data.moved_at);
    }

    fn apply_close_signal(&mut self, data: CloseSignalRecordedData) {
        self.close_confidence = Some(data.close_confidence);
        self.close_ready = Some(data.close_ready);
    }

    fn apply_process_completed(&mut self, data: ProcessCompletedData) {
        self.last_outcome = Some(data.outcome);
        self.current_stage_id = Some(data.final_stage_id);
        self.current_process_id = None;
        self.last_stage_moved_at = Some(data.completed_at);
    }
}
