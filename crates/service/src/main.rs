//! Order platform entry point.

use messaging::InMemoryBroker;
use metrics_exporter_prometheus::PrometheusHandle;
use notification::LogNotifier;
use service::{Config, Platform};
use sqlx::postgres::PgPoolOptions;
use store::{
    InMemoryInventoryStore, InMemoryOrderStore, InventoryStore, OrderStore, OutboxStore,
    PostgresInventoryStore, PostgresOrderStore,
};
use tokio::signal;

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
    // 1. Configuration and tracing
    let config = Config::from_env();
    service::telemetry::init_tracing(&config);

    // 2. Prometheus metrics recorder
    let metrics_handle =
        service::telemetry::install_metrics().expect("failed to install Prometheus recorder");

    // 3. Stores, then the platform around them
    let broker = InMemoryBroker::new(config.broker_config());
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to PostgreSQL");
            store::run_migrations(&pool)
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL stores");
            run(
                config,
                metrics_handle,
                PostgresOrderStore::new(pool.clone()),
                PostgresInventoryStore::new(pool),
                broker,
            )
            .await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory stores");
            run(
                config,
                metrics_handle,
                InMemoryOrderStore::new(),
                InMemoryInventoryStore::new(),
                broker,
            )
            .await;
        }
    }
}

async fn run<O, I>(
    config: Config,
    metrics_handle: PrometheusHandle,
    order_store: O,
    inventory_store: I,
    broker: InMemoryBroker,
) where
    O: OrderStore + OutboxStore + Clone + 'static,
    I: InventoryStore + Clone + 'static,
{
    let platform = Platform::start(
        &config,
        order_store,
        inventory_store,
        broker.clone(),
        LogNotifier,
    )
    .await
    .expect("failed to start platform");

    // 4. Health and metrics server
    let addr = config.addr();
    tracing::info!(%addr, "starting health and metrics server");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");

    if let Err(e) = axum::serve(listener, service::create_app(metrics_handle))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server error");
    }

    // 5. Drain consumers and the outbox before exiting
    platform.shutdown().await;
    broker.close().await;
    tracing::info!("shut down gracefully");
}
