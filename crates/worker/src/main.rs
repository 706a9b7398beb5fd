use std::sync::Arc;
use std::time::Duration;

use arena_coord::Coordinator;
use arena_core::store::KeyValueStore;
use arena_db::PgKeyValueStore;
use arena_events::{AuditPersistence, EventBus};
use arena_worker::config::ReplicaConfig;
use arena_worker::monitor::LockMonitor;
use arena_worker::reaper::ExpiredKeyReaper;
use arena_worker::ticker::{LoggingTickHandler, QueueTicker};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arena_worker=debug,arena_coord=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ReplicaConfig::from_env().expect("Invalid replica configuration");
    tracing::info!(replica_id = %config.replica_id, "Loaded replica configuration");

    // --- Database ---
    let pool = arena_db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    arena_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    arena_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Shared store ---
    let store: Arc<dyn KeyValueStore> = Arc::new(PgKeyValueStore::new(pool.clone()));

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let persistence_handle = tokio::spawn(AuditPersistence::run(pool.clone(), event_bus.subscribe()));

    // --- Coordination services ---
    let coordinator = Coordinator::new(Arc::clone(&store), Arc::clone(&event_bus));

    // --- Background tasks ---
    let cancel = CancellationToken::new();

    let ticker = QueueTicker::new(
        coordinator.matches.clone(),
        config.replica_id.clone(),
        config.queue_tick,
        Arc::new(LoggingTickHandler),
    );
    let ticker_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { ticker.run(cancel).await })
    };

    let reaper = ExpiredKeyReaper::new(Arc::clone(&store), config.reaper_interval);
    let reaper_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { reaper.run(cancel).await })
    };

    let monitor = LockMonitor::new(Arc::clone(&store), config.monitor_interval);
    let monitor_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { monitor.run(cancel).await })
    };

    tracing::info!("Replica started (queue ticker, reaper, lock monitor, audit persistence)");

    shutdown_signal().await;

    // --- Shutdown ---
    tracing::info!("Shutdown signal received, stopping background tasks");
    cancel.cancel();
    for handle in [ticker_handle, reaper_handle, monitor_handle] {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    // Dropping the last sender closes the channel and ends persistence.
    drop(coordinator);
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), persistence_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
