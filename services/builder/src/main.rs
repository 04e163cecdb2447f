use std::env;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lv_bus::Bus;

use builder::service::BuilderService;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let redis_url = env::var("REDIS_URL").expect("REDIS_URL must be set");

    info!("connecting to database...");
    let pool = lv_store::create_pool_with_retry(&database_url, 10, Duration::from_secs(2))
        .await
        .expect("failed to connect to Postgres");
    lv_store::run_migrations(&pool)
        .await
        .expect("failed to run database migrations");

    let bus = Bus::connect_with_retry(&redis_url, 10, Duration::from_secs(2))
        .await
        .expect("failed to connect to Redis");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    info!("builder service started");
    BuilderService::new(bus, pool).run(shutdown_rx).await;
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
