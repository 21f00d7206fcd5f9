//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use saga_store::SagaStore;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub broker: BrokerHealth,
    pub store: StoreHealth,
}

#[derive(Serialize)]
pub struct BrokerHealth {
    pub provider: &'static str,
    pub healthy: bool,
}

#[derive(Serialize)]
pub struct StoreHealth {
    pub healthy: bool,
}

/// GET /health — reports broker and store connectivity; 503 when either
/// dependency is down.
pub async fn check<S: SagaStore>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthResponse>) {
    let broker_healthy = state.broker.is_healthy().await;
    let store_healthy = state.coordinator.store().ping().await.is_ok();

    let status_code = if broker_healthy && store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if status_code == StatusCode::OK {
            "ok"
        } else {
            "degraded"
        },
        broker: BrokerHealth {
            provider: state.broker.provider_name(),
            healthy: broker_healthy,
        },
        store: StoreHealth {
            healthy: store_healthy,
        },
    };

    (status_code, Json(response))
}
