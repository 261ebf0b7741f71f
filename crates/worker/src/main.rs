use std::sync::Arc;
use std::time::Duration;

use flooddash_core::rules::engine::AlertEngine;
use flooddash_core::store::Stores;
use flooddash_db::PgStore;
use flooddash_events::{AlertJournal, EventBus};
use flooddash_worker::config::WorkerConfig;
use flooddash_worker::scheduler;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flooddash_worker=info,flooddash_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env().expect("Invalid worker configuration");
    tracing::info!(
        interval_secs = config.eval_interval.as_secs(),
        rate_limit_mm_per_sec = config.engine.rate_limit_mm_per_sec,
        low_battery_mv = config.engine.low_battery_mv,
        "Loaded worker configuration"
    );

    // --- Database ---
    let pool = flooddash_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    flooddash_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    flooddash_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    let stores = Stores::shared(Arc::new(PgStore::new(pool)));
    scheduler::report_unassigned_rules(stores.rules.as_ref(), config.engine.fetch_timeout).await;

    // --- Engine and events ---
    let engine = Arc::new(AlertEngine::new(stores, config.engine.clone()));
    let bus = Arc::new(EventBus::default());
    let journal_handle = tokio::spawn(AlertJournal::run(bus.subscribe()));

    let cancel = CancellationToken::new();
    let loop_handle = tokio::spawn(scheduler::run(
        Arc::clone(&engine),
        Arc::clone(&bus),
        config.eval_interval,
        cancel.clone(),
    ));

    shutdown_signal().await;

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(10), loop_handle).await;

    // Dropping the last sender closes the channel and stops the journal.
    drop(bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), journal_handle).await;

    tracing::info!("Worker stopped");
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
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
