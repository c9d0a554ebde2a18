//! The primary adoptions read model: one row per company/product pair.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AdoptionId, CompanyId, ProductId};
use domain::adoption::AdoptionEvent;
use domain::Phase;
use event_store::{Sequence, SequencedEvent};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{ProjectionError, Result};
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// One adoption as the query side sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdoptionRow {
    /// The adoption aggregate id.
    pub adoption_id: AdoptionId,

    /// The company side of the pair.
    pub company_id: CompanyId,

    /// The product side of the pair.
    pub product_id: ProductId,

    /// Current lifecycle phase.
    pub phase: Phase,

    /// Status of the current or last process: `open` while a process runs,
    /// otherwise the outcome it ended with.
    pub status: String,

    /// The active process, if any.
    pub current_process_id: Option<String>,

    /// The current stage. Survives process completion as the final stage.
    pub current_stage_id: Option<String>,

    /// When the current stage was entered.
    pub stage_entered_at: Option<DateTime<Utc>>,

    /// When any stage movement last happened.
    pub last_stage_moved_at: Option<DateTime<Utc>>,

    /// The owning account executive.
    pub owner: Option<String>,

    /// The pricing tier.
    pub tier: Option<String>,

    /// Monthly recurring revenue in cents.
    pub mrr_cents: Option<i64>,

    /// Licensed seat count.
    pub seats: Option<u32>,

    /// When the next step is due.
    pub next_step_due_at: Option<DateTime<Utc>>,

    /// Free-form note for the next step.
    pub next_step_note: Option<String>,

    /// Latest close-confidence signal, in `0.0..=1.0`.
    pub close_confidence: Option<f64>,

    /// Latest close-readiness judgement.
    pub close_ready: Option<bool>,

    /// Highest per-aggregate sequence folded into this row. Events at or
    /// below this watermark are redeliveries and must not be applied.
    pub last_applied_sequence: Sequence,
}

impl AdoptionRow {
    fn new(adoption_id: AdoptionId, company_id: CompanyId, product_id: ProductId) -> Self {
        Self {
            adoption_id,
            company_id,
            product_id,
            phase: Phase::Prospect,
            status: "open".to_string(),
            current_process_id: None,
            current_stage_id: None,
            stage_entered_at: None,
            last_stage_moved_at: None,
            owner: None,
            tier: None,
            mrr_cents: None,
            seats: None,
            next_step_due_at: None,
            next_step_note: None,
            close_confidence: None,
            close_ready: None,
            last_applied_sequence: Sequence::initial(),
        }
    }

    fn apply(&mut self, event: &AdoptionEvent) {
        match event {
            AdoptionEvent::SaleStarted(data) => {
                self.phase = Phase::InSales;
                self.status = "open".to_string();
                self.current_process_id = Some(data.process_id.clone());
                self.current_stage_id = Some(data.stage_id.clone());
                self.stage_entered_at = Some(data.started_at);
                self.last_stage_moved_at = Some(data.started_at);
            }
            AdoptionEvent::OnboardingStarted(data) => {
                self.phase = Phase::Onboarding;
                self.status = "open".to_string();
                self.current_process_id = Some(data.process_id.clone());
                self.current_stage_id = Some(data.stage_id.clone());
                self.stage_entered_at = Some(data.started_at);
                self.last_stage_moved_at = Some(data.started_at);
            }
            AdoptionEvent::EngagementStarted(data) => {
                self.phase = Phase::Active;
                self.status = "open".to_string();
                self.current_process_id = Some(data.process_id.clone());
                self.current_stage_id = Some(data.stage_id.clone());
                self.stage_entered_at = Some(data.started_at);
                self.last_stage_moved_at = Some(data.started_at);
            }
            AdoptionEvent::StageAdvanced(data) => {
                self.current_stage_id = Some(data.to_stage_id.clone());
                self.stage_entered_at = Some(data.moved_at);
                self.last_stage_moved_at = Some(data.moved_at);
            }
            AdoptionEvent::PhaseChanged(data) => {
                self.phase = data.to_phase;
                if data.to_phase == Phase::Churned {
                    self.status = "churned".to_string();
                }
            }
            AdoptionEvent::OwnerChanged(data) => {
                self.owner = Some(data.new_owner.clone());
            }
            AdoptionEvent::TierChanged(data) => {
                self.tier = Some(data.new_tier.clone());
            }
            AdoptionEvent::MrrChanged(data) => {
                self.mrr_cents = Some(data.new_mrr_cents);
            }
            AdoptionEvent::SeatsChanged(data) => {
                self.seats = Some(data.new_seats);
            }
            AdoptionEvent::NextStepScheduled(data) => {
                self.next_step_due_at = Some(data.due_at);
                self.next_step_note = data.note.clone();
            }
            AdoptionEvent::CloseSignalRecorded(data) => {
                self.close_confidence = Some(data.close_confidence);
                self.close_ready = Some(data.close_ready);
            }
            AdoptionEvent::ProcessCompleted(data) => {
                self.current_process_id = None;
                self.current_stage_id = Some(data.final_stage_id.clone());
                self.status = data.outcome.as_str().to_string();
                self.stage_entered_at = Some(data.completed_at);
                self.last_stage_moved_at = Some(data.completed_at);
            }
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<AdoptionId, AdoptionRow>,
    cursor: u64,
}

/// In-memory adoptions view.
///
/// Rows and the catch-up cursor live behind one lock, so a row and its
/// watermark always move together and a crash mid-batch loses only forward
/// progress.
#[derive(Debug, Clone, Default)]
pub struct AdoptionsView {
    inner: Arc<RwLock<Inner>>,
}

impl AdoptionsView {
    /// Creates an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the row for an adoption, if the view has seen it.
    pub async fn get(&self, adoption_id: AdoptionId) -> Option<AdoptionRow> {
        self.inner.read().await.rows.get(&adoption_id).cloned()
    }

    /// Returns all rows.
    pub async fn all(&self) -> Vec<AdoptionRow> {
        self.inner.read().await.rows.values().cloned().collect()
    }

    /// Returns the rows currently in a given phase.
    pub async fn by_phase(&self, phase: Phase) -> Vec<AdoptionRow> {
        self.inner
            .read()
            .await
            .rows
            .values()
            .filter(|row| row.phase == phase)
            .cloned()
            .collect()
    }

    /// Returns non-terminal rows whose latest close signal says ready.
    pub async fn ready_to_close(&self) -> Vec<AdoptionRow> {
        self.inner
            .read()
            .await
            .rows
            .values()
            .filter(|row| row.close_ready == Some(true) && !row.phase.is_terminal())
            .cloned()
            .collect()
    }

    /// Returns non-terminal rows whose next step was due before `now`.
    pub async fn overdue(&self, now: DateTime<Utc>) -> Vec<AdoptionRow> {
        self.inner
            .read()
            .await
            .rows
            .values()
            .filter(|row| {
                !row.phase.is_terminal()
                    && row.next_step_due_at.is_some_and(|due_at| due_at < now)
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Projection for AdoptionsView {
    fn name(&self) -> &'static str {
        "adoptions"
    }

    async fn handle(&self, event: &SequencedEvent) -> Result<()> {
        let envelope = &event.envelope;
        let domain_event: AdoptionEvent = serde_json::from_value(envelope.payload.clone())?;

        let mut inner = self.inner.write().await;

        let row = match inner.rows.entry(envelope.aggregate_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let AdoptionEvent::SaleStarted(data) = &domain_event else {
                    return Err(ProjectionError::Projection(format!(
                        "{} for unknown adoption {}",
                        envelope.event_type, envelope.aggregate_id
                    )));
                };
                entry.insert(AdoptionRow::new(
                    data.adoption_id,
                    data.company_id,
                    data.product_id,
                ))
            }
        };

        // Watermark guard: redelivered events are absorbed without effect
        if envelope.sequence > row.last_applied_sequence {
            row.apply(&domain_event);
            row.last_applied_sequence = envelope.sequence;
        }

        // The cursor moves only past events that were folded in (or absorbed),
        // so a failed event is re-attempted by the next catch-up
        inner.cursor = inner.cursor.max(event.position);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        ProjectionPosition::at(self.inner.read().await.cursor)
    }

    async fn reset(&self) {
        let mut inner = self.inner.write().await;
        inner.rows.clear();
        inner.cursor = 0;
    }
}

#[async_trait]
impl ReadModel for AdoptionsView {
    fn name(&self) -> &'static str {
        "adoptions"
    }

    async fn count(&self) -> usize {
        self.inner.read().await.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use common::Actor;
    use event_store::EventEnvelope;

    use super::*;

    fn make_event(
        aggregate_id: AdoptionId,
        sequence: i64,
        position: u64,
        event: AdoptionEvent,
    ) -> SequencedEvent {
        use domain::DomainEvent;
        let envelope = EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Adoption")
            .event_type(event.event_type())
            .sequence(Sequence::new(sequence))
            .actor(Actor::user("test"))
            .payload(&event)
            .unwrap()
            .build();
        SequencedEvent { position, envelope }
    }

    fn sale_started(
        adoption_id: AdoptionId,
        company_id: CompanyId,
        product_id: ProductId,
    ) -> AdoptionEvent {
        AdoptionEvent::sale_started(
            adoption_id,
            company_id,
            product_id,
            "sales_default",
            "discovery",
        )
    }

    #[tokio::test]
    async fn sale_started_creates_row() {
        let view = AdoptionsView::new();
        let company_id = CompanyId::new();
        let product_id = ProductId::new();
        let id = AdoptionId::derive(company_id, product_id);

        view.handle(&make_event(id, 1, 1, sale_started(id, company_id, product_id)))
            .await
            .unwrap();

        let row = view.get(id).await.unwrap();
        assert_eq!(row.phase, Phase::InSales);
        assert_eq!(row.status, "open");
        assert_eq!(row.current_process_id.as_deref(), Some("sales_default"));
        assert_eq!(row.current_stage_id.as_deref(), Some("discovery"));
        assert_eq!(row.last_applied_sequence, Sequence::first());
        assert_eq!(view.count().await, 1);
    }

    #[tokio::test]
    async fn event_for_unknown_adoption_is_rejected() {
        let view = AdoptionsView::new();
        let id = AdoptionId::derive(CompanyId::new(), ProductId::new());

        let result = view
            .handle(&make_event(
                id,
                1,
                1,
                AdoptionEvent::mrr_changed(None, 5000),
            ))
            .await;
        assert!(matches!(result, Err(ProjectionError::Projection(_))));
    }

    #[tokio::test]
    async fn failed_event_leaves_cursor_unmoved() {
        let view = AdoptionsView::new();
        let id = AdoptionId::derive(CompanyId::new(), ProductId::new());

        let bad = make_event(id, 1, 5, AdoptionEvent::mrr_changed(None, 5000));
        assert!(view.handle(&bad).await.is_err());

        // The event was not applied, so it must be re-attempted, not skipped
        assert_eq!(view.position().await, ProjectionPosition::start());
        assert!(view.handle(&bad).await.is_err());
        assert_eq!(view.position().await, ProjectionPosition::start());
    }

    #[tokio::test]
    async fn redelivered_event_is_absorbed() {
        let view = AdoptionsView::new();
        let company_id = CompanyId::new();
        let product_id = ProductId::new();
        let id = AdoptionId::derive(company_id, product_id);

        view.handle(&make_event(id, 1, 1, sale_started(id, company_id, product_id)))
            .await
            .unwrap();
        let mrr = make_event(id, 2, 2, AdoptionEvent::mrr_changed(None, 9000));
        view.handle(&mrr).await.unwrap();

        // Deliver the same event again; the watermark keeps the row stable
        view.handle(&mrr).await.unwrap();
        let row = view.get(id).await.unwrap();
        assert_eq!(row.mrr_cents, Some(9000));
        assert_eq!(row.last_applied_sequence, Sequence::new(2));
    }

    #[tokio::test]
    async fn process_completed_clears_active_process() {
        let view = AdoptionsView::new();
        let company_id = CompanyId::new();
        let product_id = ProductId::new();
        let id = AdoptionId::derive(company_id, product_id);

        view.handle(&make_event(id, 1, 1, sale_started(id, company_id, product_id)))
            .await
            .unwrap();
        view.handle(&make_event(
            id,
            2,
            2,
            AdoptionEvent::process_completed("sales_default", domain::Outcome::Won, "closed_won"),
        ))
        .await
        .unwrap();

        let row = view.get(id).await.unwrap();
        assert_eq!(row.current_process_id, None);
        assert_eq!(row.current_stage_id.as_deref(), Some("closed_won"));
        assert_eq!(row.status, "won");
    }

    #[tokio::test]
    async fn phase_queries() {
        let view = AdoptionsView::new();
        let company_id = CompanyId::new();
        let product_id = ProductId::new();
        let id = AdoptionId::derive(company_id, product_id);

        view.handle(&make_event(id, 1, 1, sale_started(id, company_id, product_id)))
            .await
            .unwrap();

        assert_eq!(view.by_phase(Phase::InSales).await.len(), 1);
        assert_eq!(view.by_phase(Phase::Active).await.len(), 0);
    }

    #[tokio::test]
    async fn close_signal_and_overdue_queries() {
        let view = AdoptionsView::new();
        let company_id = CompanyId::new();
        let product_id = ProductId::new();
        let id = AdoptionId::derive(company_id, product_id);
        let now = Utc::now();

        view.handle(&make_event(id, 1, 1, sale_started(id, company_id, product_id)))
            .await
            .unwrap();
        view.handle(&make_event(
            id,
            2,
            2,
            AdoptionEvent::close_signal_recorded(0.9, true),
        ))
        .await
        .unwrap();
        view.handle(&make_event(
            id,
            3,
            3,
            AdoptionEvent::next_step_scheduled(now - Duration::days(2), None),
        ))
        .await
        .unwrap();

        assert_eq!(view.ready_to_close().await.len(), 1);
        assert_eq!(view.overdue(now).await.len(), 1);
        assert_eq!(view.overdue(now - Duration::days(3)).await.len(), 0);
    }

    #[tokio::test]
    async fn reset_clears_rows_and_cursor() {
        let view = AdoptionsView::new();
        let company_id = CompanyId::new();
        let product_id = ProductId::new();
        let id = AdoptionId::derive(company_id, product_id);

        view.handle(&make_event(id, 1, 7, sale_started(id, company_id, product_id)))
            .await
            .unwrap();
        assert_eq!(view.position().await.cursor, 7);

        view.reset().await;
        assert_eq!(view.count().await, 0);
        assert_eq!(view.position().await, ProjectionPosition::start());
    }
}
