//! Admin endpoints: saga statistics and a manual sweep trigger.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use saga::SweepReport;
use saga_store::{SagaStatus, SagaStore};
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct SagaStats {
    pub by_status: BTreeMap<&'static str, i64>,
    pub active: i64,
    pub stuck: i64,
}

/// GET /admin/sagas/stats — counts by status plus the current stuck count.
pub async fn stats<S: SagaStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<SagaStats>, ApiError> {
    let store = state.coordinator.store();

    let mut by_status = BTreeMap::new();
    for status in [
        SagaStatus::PaymentProcessing,
        SagaStatus::InventoryProcessing,
        SagaStatus::ShippingProcessing,
        SagaStatus::Completed,
        SagaStatus::Compensating,
        SagaStatus::Compensated,
        SagaStatus::Failed,
    ] {
        by_status.insert(status.as_str(), store.count_by_status(status).await?);
    }

    let active = store.count_by_status_in(SagaStatus::PROCESSING).await?;
    let cutoff = Utc::now() - state.stuck_threshold;
    let stuck = store.count_stuck(SagaStatus::PROCESSING, cutoff).await?;

    Ok(Json(SagaStats {
        by_status,
        active,
        stuck,
    }))
}

/// POST /admin/sagas/sweep — runs one stuck sweep immediately and returns
/// what it rescued.
pub async fn sweep<S: SagaStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<SweepReport>, ApiError> {
    let report = state
        .coordinator
        .process_stuck_sagas(state.stuck_threshold)
        .await?;
    Ok(Json(report))
}
