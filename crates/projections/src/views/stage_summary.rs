//! Pipeline reporting: adoption counts by stage and by phase.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AdoptionId;
use domain::adoption::AdoptionEvent;
use domain::Phase;
use event_store::{Sequence, SequencedEvent};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// Number of adoptions sitting in one stage of one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCount {
    /// The process the stage belongs to.
    pub process_id: String,

    /// The stage.
    pub stage_id: String,

    /// Adoptions currently in that stage.
    pub count: usize,
}

/// Number of adoptions in one lifecycle phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseCount {
    /// The lifecycle phase.
    pub phase: Phase,

    /// Adoptions currently in that phase.
    pub count: usize,
}

#[derive(Debug, Clone)]
struct SummaryRow {
    phase: Phase,
    current: Option<(String, String)>,
    last_applied_sequence: Sequence,
}

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<AdoptionId, SummaryRow>,
    cursor: u64,
}

/// Aggregated pipeline view backing the stage and phase reports.
///
/// Keeps one small record per adoption and derives counts on demand, so the
/// fold stays a plain per-event update.
#[derive(Debug, Clone, Default)]
pub struct StageSummaryView {
    inner: Arc<RwLock<Inner>>,
}

// Report ordering follows the lifecycle, not alphabetics
const PHASE_ORDER: [Phase; 5] = [
    Phase::Prospect,
    Phase::InSales,
    Phase::Onboarding,
    Phase::Active,
    Phase::Churned,
];

impl StageSummaryView {
    /// Creates an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts adoptions per `(process, stage)`, for adoptions currently in a
    /// process. Sorted by process then stage id.
    pub async fn stage_counts(&self) -> Vec<StageCount> {
        let inner = self.inner.read().await;
        let mut counts: HashMap<(String, String), usize> = HashMap::new();
        for row in inner.rows.values() {
            if let Some((process_id, stage_id)) = &row.current {
                *counts
                    .entry((process_id.clone(), stage_id.clone()))
                    .or_default() += 1;
            }
        }

        let mut result: Vec<StageCount> = counts
            .into_iter()
            .map(|((process_id, stage_id), count)| StageCount {
                process_id,
                stage_id,
                count,
            })
            .collect();
        result.sort_by(|a, b| {
            a.process_id
                .cmp(&b.process_id)
                .then_with(|| a.stage_id.cmp(&b.stage_id))
        });
        result
    }

    /// Counts adoptions per lifecycle phase, in lifecycle order. Phases with
    /// no adoptions are omitted.
    pub async fn phase_counts(&self) -> Vec<PhaseCount> {
        let inner = self.inner.read().await;
        let mut counts: HashMap<Phase, usize> = HashMap::new();
        for row in inner.rows.values() {
            *counts.entry(row.phase).or_default() += 1;
        }

        PHASE_ORDER
            .iter()
            .filter_map(|phase| {
                counts.get(phase).map(|&count| PhaseCount {
                    phase: *phase,
                    count,
                })
            })
            .collect()
    }
}

#[async_trait]
impl Projection for StageSummaryView {
    fn name(&self) -> &'static str {
        "stage_summary"
    }

    async fn handle(&self, event: &SequencedEvent) -> Result<()> {
        let envelope = &event.envelope;
        let domain_event: AdoptionEvent = serde_json::from_value(envelope.payload.clone())?;

        let mut inner = self.inner.write().await;

        let row = inner
            .rows
            .entry(envelope.aggregate_id)
            .or_insert_with(|| SummaryRow {
                phase: Phase::Prospect,
                current: None,
                last_applied_sequence: Sequence::initial(),
            });
        // Watermark guard: redelivered events are absorbed without effect
        if envelope.sequence > row.last_applied_sequence {
            match &domain_event {
                AdoptionEvent::SaleStarted(data) => {
                    row.phase = Phase::InSales;
                    row.current = Some((data.process_id.clone(), data.stage_id.clone()));
                }
                AdoptionEvent::OnboardingStarted(data) => {
                    row.phase = Phase::Onboarding;
                    row.current = Some((data.process_id.clone(), data.stage_id.clone()));
                }
                AdoptionEvent::EngagementStarted(data) => {
                    row.phase = Phase::Active;
                    row.current = Some((data.process_id.clone(), data.stage_id.clone()));
                }
                AdoptionEvent::StageAdvanced(data) => {
                    row.current = Some((data.process_id.clone(), data.to_stage_id.clone()));
                }
                AdoptionEvent::PhaseChanged(data) => {
                    row.phase = data.to_phase;
                }
                AdoptionEvent::ProcessCompleted(_) => {
                    row.current = None;
                }
                // Attribute and signal events don't move the pipeline
                _ => {}
            }
            row.last_applied_sequence = envelope.sequence;
        }

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
impl ReadModel for StageSummaryView {
    fn name(&self) -> &'static str {
        "stage_summary"
    }

    async fn count(&self) -> usize {
        self.inner.read().await.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use common::{Actor, CompanyId, ProductId};
    use domain::DomainEvent;
    use event_store::EventEnvelope;

    use super::*;

    fn make_event(
        aggregate_id: AdoptionId,
        sequence: i64,
        position: u64,
        event: AdoptionEvent,
    ) -> SequencedEvent {
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

    fn start_sale(id: AdoptionId) -> AdoptionEvent {
        AdoptionEvent::sale_started(
            id,
            CompanyId::new(),
            ProductId::new(),
            "sales_default",
            "discovery",
        )
    }

    #[tokio::test]
    async fn counts_group_by_stage() {
        let view = StageSummaryView::new();
        let mut position = 0;
        for _ in 0..3 {
            let id = AdoptionId::derive(CompanyId::new(), ProductId::new());
            position += 1;
            view.handle(&make_event(id, 1, position, start_sale(id)))
                .await
                .unwrap();
        }
        let id = AdoptionId::derive(CompanyId::new(), ProductId::new());
        view.handle(&make_event(id, 1, position + 1, start_sale(id)))
            .await
            .unwrap();
        view.handle(&make_event(
            id,
            2,
            position + 2,
            AdoptionEvent::stage_advanced(
                "sales_default",
                Some("discovery".to_string()),
                "proposal",
            ),
        ))
        .await
        .unwrap();

        let counts = view.stage_counts().await;
        assert_eq!(
            counts,
            vec![
                StageCount {
                    process_id: "sales_default".to_string(),
                    stage_id: "discovery".to_string(),
                    count: 3,
                },
                StageCount {
                    process_id: "sales_default".to_string(),
                    stage_id: "proposal".to_string(),
                    count: 1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn completed_process_leaves_stage_counts() {
        let view = StageSummaryView::new();
        let id = AdoptionId::derive(CompanyId::new(), ProductId::new());

        view.handle(&make_event(id, 1, 1, start_sale(id)))
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

        assert!(view.stage_counts().await.is_empty());
        assert_eq!(view.count().await, 1);
    }

    #[tokio::test]
    async fn phase_counts_follow_lifecycle_order() {
        let view = StageSummaryView::new();
        let mut position = 0;

        // Two in sales, one pushed on to onboarding
        for _ in 0..3 {
            let id = AdoptionId::derive(CompanyId::new(), ProductId::new());
            position += 1;
            view.handle(&make_event(id, 1, position, start_sale(id)))
                .await
                .unwrap();
        }
        let id = AdoptionId::derive(CompanyId::new(), ProductId::new());
        view.handle(&make_event(id, 1, position + 1, start_sale(id)))
            .await
            .unwrap();
        view.handle(&make_event(
            id,
            2,
            position + 2,
            AdoptionEvent::onboarding_started("onboarding_default", "kickoff"),
        ))
        .await
        .unwrap();

        let counts = view.phase_counts().await;
        assert_eq!(
            counts,
            vec![
                PhaseCount {
                    phase: Phase::InSales,
                    count: 3,
                },
                PhaseCount {
                    phase: Phase::Onboarding,
                    count: 1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn redelivery_does_not_double_count() {
        let view = StageSummaryView::new();
        let id = AdoptionId::derive(CompanyId::new(), ProductId::new());
        let event = make_event(id, 1, 1, start_sale(id));

        view.handle(&event).await.unwrap();
        view.handle(&event).await.unwrap();

        let counts = view.stage_counts().await;
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].count, 1);
    }
}
