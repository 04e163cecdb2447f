use std::env;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lv_bus::Bus;
use lv_providers::{EspnConnector, HealthScorer};

use scheduler::config::SchedulerSettings;
use scheduler::service::SchedulerService;
use scheduler::sync::ScheduleSync;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let settings = SchedulerSettings::from_env();

    info!("connecting to database...");
    let pool = lv_store::create_pool_with_retry(&settings.database_url, 10, Duration::from_secs(2))
        .await
        .expect("failed to connect to Postgres");
    lv_store::run_migrations(&pool)
        .await
        .expect("failed to run database migrations");
    info!("migrations applied");

    let bus = Bus::connect_with_retry(&settings.redis_url, 10, Duration::from_secs(2))
        .await
        .expect("failed to connect to Redis");

    let scorer = HealthScorer::new(bus.clone(), settings.health_window);
    let espn = EspnConnector::new(settings.request_timeout).expect("failed to build ESPN client");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    info!(instance_id = %settings.instance_id, "scheduler service started");

    let sync_service = ScheduleSync::new(pool.clone(), espn);
    let sync_shutdown = shutdown_rx.clone();
    let sync_task = tokio::spawn(async move { sync_service.run(sync_shutdown).await });

    let mut scheduler = SchedulerService::new(bus, pool, scorer, settings);
    scheduler.run(shutdown_rx).await;

    let _ = sync_task.await;
    info!("scheduler service stopped");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
