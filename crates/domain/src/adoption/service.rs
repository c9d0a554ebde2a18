//! Adoption service providing one entry point per command.

use std::sync::Arc;

use common::AdoptionId;
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{
    Adoption, AdvanceStage, CompleteOnboardingAndStartEngagement, CompleteProcess,
    CompleteSaleAndStartOnboarding, ProcessCatalog, RecordCloseSignal, ScheduleNextStep, SetMrr,
    SetOwner, SetPhase, SetSeats, SetTier, StartSale,
};

impl From<super::AdoptionError> for DomainError {
    fn from(e: super::AdoptionError) -> Self {
        DomainError::Adoption(e)
    }
}

/// Service for managing adoptions.
///
/// Provides a high-level API for adoption operations, wrapping the command
/// handler and carrying the process catalog every decision needs.
pub struct AdoptionService<S: EventStore> {
    handler: CommandHandler<S, Adoption>,
    catalog: Arc<ProcessCatalog>,
}

impl<S: EventStore> AdoptionService<S> {
    /// Creates a new adoption service with the given event store and catalog.
    pub fn new(store: S, catalog: Arc<ProcessCatalog>) -> Self {
        Self {
            handler: CommandHandler::new(store),
            catalog,
        }
    }

    /// Creates a service backed by the built-in standard catalog.
    pub fn with_standard_catalog(store: S) -> Self {
        Self::new(store, Arc::new(ProcessCatalog::standard()))
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Adoption> {
        &self.handler
    }

    /// Returns the process catalog in use.
    pub fn catalog(&self) -> &ProcessCatalog {
        &self.catalog
    }

    /// Starts a sales process for a `(company, product)` pair.
    #[tracing::instrument(skip(self))]
    pub async fn start_sale(&self, cmd: StartSale) -> Result<CommandResult<Adoption>, DomainError> {
        let aggregate_id = cmd.aggregate_id();
        self.handler
            .execute(aggregate_id, &cmd.actor, |adoption| {
                adoption.start_sale(
                    aggregate_id,
                    cmd.company_id,
                    cmd.product_id,
                    &self.catalog,
                    &cmd.process_id,
                    cmd.stage_id.as_deref(),
                )
            })
            .await
    }

    /// Moves an adoption to another stage of its current process.
    #[tracing::instrument(skip(self))]
    pub async fn advance_stage(
        &self,
        cmd: AdvanceStage,
    ) -> Result<CommandResult<Adoption>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), &cmd.actor, |adoption| {
                adoption.advance_stage(&self.catalog, &cmd.to_stage_id)
            })
            .await
    }

    /// Forces the lifecycle phase directly.
    #[tracing::instrument(skip(self))]
    pub async fn set_phase(&self, cmd: SetPhase) -> Result<CommandResult<Adoption>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), &cmd.actor, |adoption| {
                adoption.set_phase(cmd.to_phase, &cmd.reason, cmd.churn_reason.as_deref())
            })
            .await
    }

    /// Changes the owning account executive.
    #[tracing::instrument(skip(self))]
    pub async fn set_owner(&self, cmd: SetOwner) -> Result<CommandResult<Adoption>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), &cmd.actor, |adoption| {
                adoption.set_owner(&cmd.owner)
            })
            .await
    }

    /// Changes the pricing tier.
    #[tracing::instrument(skip(self))]
    pub async fn set_tier(&self, cmd: SetTier) -> Result<CommandResult<Adoption>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), &cmd.actor, |adoption| {
                adoption.set_tier(&cmd.tier)
            })
            .await
    }

    /// Changes monthly recurring revenue.
    #[tracing::instrument(skip(self))]
    pub async fn set_mrr(&self, cmd: SetMrr) -> Result<CommandResult<Adoption>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), &cmd.actor, |adoption| {
                adoption.set_mrr(cmd.mrr_cents)
            })
            .await
    }

    /// Changes the licensed seat count.
    #[tracing::instrument(skip(self))]
    pub async fn set_seats(&self, cmd: SetSeats) -> Result<CommandResult<Adoption>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), &cmd.actor, |adoption| {
                adoption.set_seats(cmd.seats)
            })
            .await
    }

    /// Schedules the next step.
    #[tracing::instrument(skip(self))]
    pub async fn schedule_next_step(
        &self,
        cmd: ScheduleNextStep,
    ) -> Result<CommandResult<Adoption>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), &cmd.actor, |adoption| {
                adoption.schedule_next_step(cmd.due_at, cmd.note.as_deref())
            })
            .await
    }

    /// Records a close-readiness signal.
    #[tracing::instrument(skip(self))]
    pub async fn record_close_signal(
        &self,
        cmd: RecordCloseSignal,
    ) -> Result<CommandResult<Adoption>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), &cmd.actor, |adoption| {
                adoption.record_close_signal(cmd.close_confidence, cmd.close_ready)
            })
            .await
    }

    /// Completes the current process with an outcome.
    #[tracing::instrument(skip(self))]
    pub async fn complete_process(
        &self,
        cmd: CompleteProcess,
    ) -> Result<CommandResult<Adoption>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), &cmd.actor, |adoption| {
                adoption.complete_process(&self.catalog, &cmd.process_id, cmd.outcome)
            })
            .await
    }

    /// Completes the sales process as won and starts onboarding atomically.
    #[tracing::instrument(skip(self))]
    pub async fn complete_sale_and_start_onboarding(
        &self,
        cmd: CompleteSaleAndStartOnboarding,
    ) -> Result<CommandResult<Adoption>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), &cmd.actor, |adoption| {
                adoption.complete_sale_and_start_onboarding(&self.catalog)
            })
            .await
    }

    /// Completes onboarding and starts engagement atomically.
    #[tracing::instrument(skip(self))]
    pub async fn complete_onboarding_and_start_engagement(
        &self,
        cmd: CompleteOnboardingAndStartEngagement,
    ) -> Result<CommandResult<Adoption>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), &cmd.actor, |adoption| {
                adoption.complete_onboarding_and_start_engagement(&self.catalog)
            })
            .await
    }

    /// Loads an adoption by id.
    ///
    /// Returns None if the adoption doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_adoption(
        &self,
        adoption_id: AdoptionId,
    ) -> Result<Option<Adoption>, DomainError> {
        self.handler.load_existing(adoption_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adoption::{AdoptionError, Outcome, Phase};
    use crate::aggregate::Aggregate;
    use common::{Actor, CompanyId, ProductId};
    use event_store::InMemoryEventStore;

    fn service() -> AdoptionService<InMemoryEventStore> {
        AdoptionService::with_standard_catalog(InMemoryEventStore::new())
    }

    fn pair() -> (CompanyId, ProductId, Actor) {
        (CompanyId::new(), ProductId::new(), Actor::user("u-1"))
    }

    #[tokio::test]
    async fn test_start_sale() {
        let service = service();
        let (company_id, product_id, actor) = pair();

        let result = service
            .start_sale(StartSale::new(company_id, product_id, actor, "sales_default"))
            .await
            .unwrap();

        assert_eq!(result.aggregate.phase(), Phase::InSales);
        assert_eq!(result.events.len(), 1);
        assert_eq!(
            result.aggregate.id(),
            Some(AdoptionId::derive(company_id, product_id))
        );
    }

    #[tokio::test]
    async fn test_same_pair_hits_same_aggregate() {
        let service = service();
        let (company_id, product_id, actor) = pair();

        service
            .start_sale(StartSale::new(
                company_id,
                product_id,
                actor.clone(),
                "sales_default",
            ))
            .await
            .unwrap();

        // A second StartSale for the same pair lands on the same aggregate
        // and is rejected by the phase guard.
        let result = service
            .start_sale(StartSale::new(company_id, product_id, actor, "sales_default"))
            .await;

        assert!(matches!(result, Err(DomainError::Adoption(_))));
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let service = service();
        let (company_id, product_id, actor) = pair();

        service
            .start_sale(StartSale::new(
                company_id,
                product_id,
                actor.clone(),
                "sales_default",
            ))
            .await
            .unwrap();

        service
            .advance_stage(AdvanceStage::new(
                company_id,
                product_id,
                actor.clone(),
                "negotiation",
            ))
            .await
            .unwrap();

        let result = service
            .complete_sale_and_start_onboarding(CompleteSaleAndStartOnboarding::new(
                company_id,
                product_id,
                actor.clone(),
            ))
            .await
            .unwrap();
        assert_eq!(result.events.len(), 2);
        assert_eq!(result.aggregate.phase(), Phase::Onboarding);

        let result = service
            .complete_onboarding_and_start_engagement(CompleteOnboardingAndStartEngagement::new(
                company_id,
                product_id,
                actor,
            ))
            .await
            .unwrap();
        assert_eq!(result.aggregate.phase(), Phase::Active);
        assert_eq!(
            result.aggregate.current_process_id(),
            Some("engagement_default")
        );
    }

    #[tokio::test]
    async fn test_complete_process_with_outcome() {
        let service = service();
        let (company_id, product_id, actor) = pair();

        service
            .start_sale(StartSale::new(
                company_id,
                product_id,
                actor.clone(),
                "sales_default",
            ))
            .await
            .unwrap();

        let result = service
            .complete_process(CompleteProcess::new(
                company_id,
                product_id,
                actor,
                "sales_default",
                Outcome::Lost,
            ))
            .await
            .unwrap();

        assert_eq!(result.aggregate.phase(), Phase::Prospect);
        assert_eq!(result.aggregate.last_outcome(), Some(Outcome::Lost));
    }

    #[tokio::test]
    async fn test_noop_command_persists_nothing() {
        let service = service();
        let (company_id, product_id, actor) = pair();

        service
            .start_sale(StartSale::new(
                company_id,
                product_id,
                actor.clone(),
                "sales_default",
            ))
            .await
            .unwrap();

        service
            .set_owner(SetOwner::new(company_id, product_id, actor.clone(), "alex"))
            .await
            .unwrap();

        let result = service
            .set_owner(SetOwner::new(company_id, product_id, actor, "alex"))
            .await
            .unwrap();

        assert!(result.events.is_empty());
        assert!(result.event_ids.is_empty());
    }

    #[tokio::test]
    async fn test_attribute_command_without_sale_persists_nothing() {
        let service = service();
        let (company_id, product_id, actor) = pair();

        let result = service
            .set_owner(SetOwner::new(company_id, product_id, actor, "jordan"))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Adoption(AdoptionError::AdoptionNotFound))
        ));

        // The rejected command must leave the stream empty
        let events = service
            .handler()
            .store()
            .events_for_aggregate(AdoptionId::derive(company_id, product_id))
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_get_adoption() {
        let service = service();
        let (company_id, product_id, actor) = pair();
        let adoption_id = AdoptionId::derive(company_id, product_id);

        assert!(service.get_adoption(adoption_id).await.unwrap().is_none());

        service
            .start_sale(StartSale::new(company_id, product_id, actor, "sales_default"))
            .await
            .unwrap();

        let adoption = service.get_adoption(adoption_id).await.unwrap().unwrap();
        assert_eq!(adoption.phase(), Phase::InSales);
    }

    #[tokio::test]
    async fn test_ai_actor_recorded_on_close_signal() {
        let service = service();
        let (company_id, product_id, actor) = pair();

        service
            .start_sale(StartSale::new(company_id, product_id, actor, "sales_default"))
            .await
            .unwrap();

        let ai = Actor::ai("enrichment");
        service
            .record_close_signal(RecordCloseSignal::new(
                company_id, product_id, ai.clone(), 0.85, true,
            ))
            .await
            .unwrap();

        let events = service
            .handler()
            .store()
            .events_for_aggregate(AdoptionId::derive(company_id, product_id))
            .await
            .unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.event_type, "CloseSignalRecorded");
        assert_eq!(last.actor, ai);
    }
}
