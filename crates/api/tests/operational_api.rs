//! Integration tests for the operational HTTP surface.

use std::sync::Arc;

use api::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{CorrelationId, Money, OrderId};
use domain::OrderCreated;
use messaging::{BrokerAdapter, EventContext, EventPublisher, InMemoryBroker};
use saga::SagaCoordinator;
use saga_store::InMemorySagaStore;
use tower::ServiceExt;

fn test_app(broker: InMemoryBroker) -> (axum::Router, Arc<AppState<InMemorySagaStore>>) {
    let store = InMemorySagaStore::new();
    let publisher = EventPublisher::new(Arc::new(broker.clone()), "order.events");
    let coordinator = Arc::new(SagaCoordinator::new(store, publisher, 3));

    let state = Arc::new(AppState {
        coordinator,
        broker: Arc::new(broker),
        stuck_threshold: chrono::Duration::minutes(30),
    });

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .build_recorder()
        .handle();

    (api::create_app(state.clone(), metrics_handle), state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok_when_dependencies_are_up() {
    let broker = InMemoryBroker::new();
    broker.initialize().await.unwrap();
    let (app, _) = test_app(broker);

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["broker"]["provider"], "memory");
    assert_eq!(json["broker"]["healthy"], true);
    assert_eq!(json["store"]["healthy"], true);
}

#[tokio::test]
async fn health_degrades_when_broker_is_down() {
    // Never initialized: the broker reports unhealthy.
    let (app, _) = test_app(InMemoryBroker::new());

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["broker"]["healthy"], false);
}

#[tokio::test]
async fn stats_counts_sagas_by_status() {
    let broker = InMemoryBroker::new();
    broker.initialize().await.unwrap();
    let (app, state) = test_app(broker);

    let ctx = EventContext::new(CorrelationId::new("corr-api"));
    state
        .coordinator
        .handle_order_created(
            OrderCreated {
                order_id: OrderId::new(),
                correlation_id: None,
                customer_id: "cust-1".to_string(),
                order_number: "ORD-1".to_string(),
                total_amount: Money::from_cents(1000),
                currency: "USD".to_string(),
                created_at: None,
                items: None,
                shipping_address: None,
                billing_address: None,
            },
            &ctx,
        )
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::get("/admin/sagas/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["by_status"]["PAYMENT_PROCESSING"], 1);
    assert_eq!(json["active"], 1);
    assert_eq!(json["stuck"], 0);
}

#[tokio::test]
async fn sweep_endpoint_runs_a_stuck_sweep() {
    let broker = InMemoryBroker::new();
    broker.initialize().await.unwrap();
    let (app, _) = test_app(broker);

    let response = app
        .oneshot(
            Request::post("/admin/sagas/sweep")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["examined"], 0);
    assert_eq!(json["retried"], 0);
}

#[tokio::test]
async fn metrics_endpoint_renders_prometheus_text() {
    let broker = InMemoryBroker::new();
    broker.initialize().await.unwrap();
    let (app, _) = test_app(broker);

    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}
