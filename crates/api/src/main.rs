//! Service entry point: wires the broker adapter, the store, the saga
//! coordinator, the ingress workers and the reconciler, then serves the
//! operational API until a shutdown signal arrives.

use std::sync::Arc;

use api::{AppState, Config};
use messaging::{
    AmqpBroker, AmqpSettings, BrokerAdapter, BrokerProvider, EventHandler, EventIngress,
    EventPublisher, InMemoryBroker, run_consumers,
};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{Reconciler, ReconcilerSettings, SagaCoordinator};
use saga_store::{InMemorySagaStore, PostgresSagaStore, SagaStore};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Load configuration (unknown SAGA_/MESSAGING_ keys abort startup)
    let config = Config::from_env().expect("invalid configuration");

    // 3. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Select and initialize the broker adapter variant
    let (adapter, amqp): (Arc<dyn BrokerAdapter>, Option<Arc<AmqpBroker>>) =
        match config.messaging_provider {
            BrokerProvider::Amqp => {
                let broker = Arc::new(AmqpBroker::new(AmqpSettings {
                    url: config.amqp_url.clone(),
                    exchange: config.exchange.clone(),
                    queue: config.queue.clone(),
                    prefetch: 10,
                    publish_timeout: config.publish_timeout,
                }));
                (broker.clone(), Some(broker))
            }
            BrokerProvider::Memory => (Arc::new(InMemoryBroker::new()), None),
        };
    adapter
        .initialize()
        .await
        .expect("failed to initialize broker adapter");
    tracing::info!(provider = adapter.provider_name(), "broker adapter ready");

    // 5. Connect the store and run the service
    if let Some(url) = config.database_url.clone() {
        let store = PostgresSagaStore::connect(&url, config.db_max_connections)
            .await
            .expect("failed to connect to database");
        store.run_migrations().await.expect("migrations failed");
        run_service(store, config, adapter, amqp, metrics_handle).await;
    } else {
        tracing::warn!("DATABASE_URL not set; using the in-memory store");
        run_service(
            InMemorySagaStore::new(),
            config,
            adapter,
            amqp,
            metrics_handle,
        )
        .await;
    }
}

async fn run_service<S: SagaStore + 'static>(
    store: S,
    config: Config,
    adapter: Arc<dyn BrokerAdapter>,
    amqp: Option<Arc<AmqpBroker>>,
    metrics_handle: PrometheusHandle,
) {
    let publisher = EventPublisher::new(adapter.clone(), config.exchange.clone());
    let coordinator = Arc::new(SagaCoordinator::new(
        store,
        publisher,
        config.max_retry_attempts,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Ingress workers (AMQP only; the memory variant has no inbound side)
    let consumer_handles = match amqp {
        Some(amqp) => {
            let ingress = Arc::new(EventIngress::new(
                coordinator.clone() as Arc<dyn EventHandler>
            ));
            run_consumers(amqp, ingress, config.consumer_workers, shutdown_rx.clone())
                .await
                .expect("failed to start ingress workers")
        }
        None => {
            tracing::warn!("memory messaging provider selected; broker ingress disabled");
            Vec::new()
        }
    };

    // Reconciler timers
    let reconciler = Reconciler::new(
        coordinator.clone(),
        ReconcilerSettings {
            stuck_sweep_interval: config.stuck_sweep_interval,
            retry_sweep_interval: config.retry_sweep_interval,
            stuck_threshold: config.stuck_threshold,
        },
    )
    .spawn(shutdown_rx.clone());

    // Operational API
    let state = Arc::new(AppState {
        coordinator,
        broker: adapter.clone(),
        stuck_threshold: config.stuck_threshold,
    });
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting operational API");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // Stop taking deliveries, drain in-flight handlers, close the broker.
    let _ = shutdown_tx.send(true);
    let drain = async {
        for handle in consumer_handles {
            let _ = handle.await;
        }
        let _ = reconciler.await;
    };
    if tokio::time::timeout(config.shutdown_drain_timeout, drain)
        .await
        .is_err()
    {
        tracing::warn!("drain timeout exceeded; abandoning remaining workers");
    }

    if let Err(e) = adapter.shutdown().await {
        tracing::warn!(error = %e, "broker shutdown failed");
    }
    tracing::info!("shut down gracefully");
}
