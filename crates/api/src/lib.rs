//! Operational HTTP surface: health, metrics, and saga administration.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use messaging::BrokerAdapter;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::SagaCoordinator;
use saga_store::SagaStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, ConfigError};

/// Shared state behind the operational routes.
pub struct AppState<S: SagaStore> {
    pub coordinator: Arc<SagaCoordinator<S>>,
    pub broker: Arc<dyn BrokerAdapter>,
    pub stuck_threshold: chrono::Duration,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: SagaStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/admin/sagas/stats", get(routes::admin::stats::<S>))
        .route("/admin/sagas/sweep", post(routes::admin::sweep::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
