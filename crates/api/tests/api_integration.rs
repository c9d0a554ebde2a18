//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use event_store::InMemoryEventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;
use uuid::Uuid;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    let store = InMemoryEventStore::new();
    let (state, _) = api::create_default_state(store);
    api::create_app(state, get_metrics_handle())
}

async fn post_command(app: &axum::Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/commands")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn start_sale_body(company_id: Uuid, product_id: Uuid) -> serde_json::Value {
    serde_json::json!({
        "action": "start_sale",
        "company_id": company_id,
        "product_id": product_id,
        "actor_id": "ae-1",
        "actor_type": "user",
        "process_id": "sales_default"
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, json) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_start_sale_command() {
    let app = setup();
    let (status, json) = post_command(&app, start_sale_body(Uuid::new_v4(), Uuid::new_v4())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["phase"], "in_sales");
    assert_eq!(json["steps"].as_array().unwrap().len(), 1);
    assert_eq!(json["steps"][0]["event_type"], "SaleStarted");
    assert_eq!(json["steps"][0]["sequence"], 1);
    assert_eq!(json["projection"]["events_processed"], 1);
}

#[tokio::test]
async fn test_command_then_query_row() {
    let app = setup();
    let company_id = Uuid::new_v4();
    let product_id = Uuid::new_v4();

    let (_, created) = post_command(&app, start_sale_body(company_id, product_id)).await;
    let adoption_id = created["adoption_id"].as_str().unwrap().to_string();

    post_command(
        &app,
        serde_json::json!({
            "action": "set_mrr",
            "company_id": company_id,
            "product_id": product_id,
            "actor_id": "ae-1",
            "actor_type": "user",
            "mrr_cents": 250_000
        }),
    )
    .await;

    let (status, row) = get_json(&app, &format!("/adoptions/{adoption_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(row["phase"], "in_sales");
    assert_eq!(row["status"], "open");
    assert_eq!(row["current_stage_id"], "discovery");
    assert_eq!(row["mrr_cents"], 250_000);
    assert_eq!(row["last_applied_sequence"], 2);

    let (status, rows) = get_json(&app, "/adoptions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_compound_command_returns_both_steps() {
    let app = setup();
    let company_id = Uuid::new_v4();
    let product_id = Uuid::new_v4();

    post_command(&app, start_sale_body(company_id, product_id)).await;

    let (status, json) = post_command(
        &app,
        serde_json::json!({
            "action": "complete_sale_and_start_onboarding",
            "company_id": company_id,
            "product_id": product_id,
            "actor_id": "ae-1",
            "actor_type": "user"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phase"], "onboarding");
    let steps = json["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0]["event_type"], "ProcessCompleted");
    assert_eq!(steps[0]["sequence"], 2);
    assert_eq!(steps[1]["event_type"], "OnboardingStarted");
    assert_eq!(steps[1]["sequence"], 3);
}

#[tokio::test]
async fn test_event_history_endpoint() {
    let app = setup();
    let company_id = Uuid::new_v4();
    let product_id = Uuid::new_v4();

    let (_, created) = post_command(&app, start_sale_body(company_id, product_id)).await;
    let adoption_id = created["adoption_id"].as_str().unwrap().to_string();

    post_command(
        &app,
        serde_json::json!({
            "action": "advance_stage",
            "company_id": company_id,
            "product_id": product_id,
            "actor_id": "ae-1",
            "actor_type": "user",
            "to_stage_id": "proposal"
        }),
    )
    .await;

    let (status, events) = get_json(&app, &format!("/adoptions/{adoption_id}/events")).await;
    assert_eq!(status, StatusCode::OK);
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event_type"], "SaleStarted");
    assert_eq!(events[0]["actor"]["kind"], "user");
    assert_eq!(events[1]["event_type"], "StageAdvanced");
    assert_eq!(events[1]["sequence"], 2);
}

#[tokio::test]
async fn test_reports_endpoints() {
    let app = setup();

    for _ in 0..2 {
        post_command(&app, start_sale_body(Uuid::new_v4(), Uuid::new_v4())).await;
    }

    let (status, stages) = get_json(&app, "/reports/stages").await;
    assert_eq!(status, StatusCode::OK);
    let stages = stages.as_array().unwrap();
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0]["process_id"], "sales_default");
    assert_eq!(stages[0]["stage_id"], "discovery");
    assert_eq!(stages[0]["count"], 2);

    let (status, phases) = get_json(&app, "/reports/phases").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(phases[0]["phase"], "in_sales");
    assert_eq!(phases[0]["count"], 2);
}

#[tokio::test]
async fn test_validation_error_maps_to_400() {
    let app = setup();
    let company_id = Uuid::new_v4();
    let product_id = Uuid::new_v4();

    post_command(&app, start_sale_body(company_id, product_id)).await;

    let (status, json) = post_command(
        &app,
        serde_json::json!({
            "action": "set_mrr",
            "company_id": company_id,
            "product_id": product_id,
            "actor_id": "ae-1",
            "actor_type": "user",
            "mrr_cents": -5
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("MRR"));
}

#[tokio::test]
async fn test_unknown_process_maps_to_404() {
    let app = setup();
    let (status, _) = post_command(
        &app,
        serde_json::json!({
            "action": "start_sale",
            "company_id": Uuid::new_v4(),
            "product_id": Uuid::new_v4(),
            "actor_id": "ae-1",
            "actor_type": "user",
            "process_id": "nonexistent"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invariant_violation_maps_to_409() {
    let app = setup();
    let company_id = Uuid::new_v4();
    let product_id = Uuid::new_v4();

    post_command(&app, start_sale_body(company_id, product_id)).await;

    // A second StartSale for the same pair is rejected by the phase guard
    let (status, json) = post_command(&app, start_sale_body(company_id, product_id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn test_attribute_command_without_sale_maps_to_404() {
    let app = setup();

    // No StartSale happened for this pair, so the command targets nothing
    let (status, json) = post_command(
        &app,
        serde_json::json!({
            "action": "set_owner",
            "company_id": Uuid::new_v4(),
            "product_id": Uuid::new_v4(),
            "actor_id": "ae-1",
            "actor_type": "user",
            "owner": "jordan"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("not found"));

    // And nothing was written, so the read model stays empty
    let (_, rows) = get_json(&app, "/adoptions").await;
    assert_eq!(rows.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_unknown_adoption_maps_to_404() {
    let app = setup();
    let (status, _) = get_json(&app, &format!("/adoptions/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(&app, "/adoptions/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    post_command(&app, start_sale_body(Uuid::new_v4(), Uuid::new_v4())).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
