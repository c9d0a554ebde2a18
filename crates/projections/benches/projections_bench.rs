use std::sync::Arc;

use common::{Actor, CompanyId, ProductId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{AdoptionService, AdvanceStage, StartSale};
use event_store::InMemoryEventStore;
use projections::{AdoptionsView, ProjectionProcessor, StageSummaryView};

/// Seeds a store with `aggregates` adoptions, each with a short pipeline
/// history.
async fn seed_store(aggregates: usize) -> InMemoryEventStore {
    let store = InMemoryEventStore::new();
    let service = AdoptionService::with_standard_catalog(store.clone());

    for _ in 0..aggregates {
        let company_id = CompanyId::new();
        let product_id = ProductId::new();
        service
            .start_sale(StartSale::new(
                company_id,
                product_id,
                Actor::system("bench"),
                "sales_default",
            ))
            .await
            .unwrap();
        for stage in ["qualification", "proposal", "negotiation"] {
            service
                .advance_stage(AdvanceStage::new(
                    company_id,
                    product_id,
                    Actor::system("bench"),
                    stage,
                ))
                .await
                .unwrap();
        }
    }

    store
}

fn make_processor(store: &InMemoryEventStore) -> ProjectionProcessor<InMemoryEventStore> {
    let mut processor = ProjectionProcessor::new(Arc::new(store.clone()));
    processor.register(Arc::new(AdoptionsView::new()));
    processor.register(Arc::new(StageSummaryView::new()));
    processor
}

fn bench_catch_up(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = rt.block_on(seed_store(100));

    c.bench_function("projections/rebuild_100_aggregates", |b| {
        b.iter(|| {
            rt.block_on(async {
                let processor = make_processor(&store);
                processor.run_catch_up().await.unwrap();
            });
        });
    });
}

fn bench_incremental_noop(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = rt.block_on(seed_store(100));
    let processor = make_processor(&store);
    rt.block_on(async {
        processor.run_catch_up().await.unwrap();
    });

    c.bench_function("projections/catch_up_at_head", |b| {
        b.iter(|| {
            rt.block_on(async {
                processor.run_catch_up().await.unwrap();
            });
        });
    });
}

fn bench_queries(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = rt.block_on(seed_store(500));
    let adoptions = Arc::new(AdoptionsView::new());
    let summary = Arc::new(StageSummaryView::new());
    let mut processor = ProjectionProcessor::new(Arc::new(store));
    processor.register(adoptions.clone());
    processor.register(summary.clone());
    rt.block_on(async {
        processor.run_catch_up().await.unwrap();
    });

    c.bench_function("projections/query_all_500_rows", |b| {
        b.iter(|| {
            rt.block_on(async {
                adoptions.all().await;
            });
        });
    });

    c.bench_function("projections/stage_counts_500_rows", |b| {
        b.iter(|| {
            rt.block_on(async {
                summary.stage_counts().await;
            });
        });
    });
}

criterion_group!(benches, bench_catch_up, bench_incremental_noop, bench_queries);
criterion_main!(benches);
