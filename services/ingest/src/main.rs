use std::env;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lv_bus::Bus;
use lv_normalize::Normalizer;
use lv_providers::{
    EspnConnector, FootballDataConnector, HealthScorer, ProviderRegistry, RegistryConfig,
    SportradarConnector, SportsProvider, TheSportsDbConnector,
};

use ingest::config::IngestSettings;
use ingest::service::IngestService;

fn build_registry(settings: &IngestSettings, bus: Bus) -> ProviderRegistry {
    let mut providers: Vec<Arc<dyn SportsProvider>> = Vec::new();

    providers.push(Arc::new(
        EspnConnector::new(settings.request_timeout).expect("failed to build ESPN connector"),
    ));
    providers.push(Arc::new(
        TheSportsDbConnector::new(settings.thesportsdb_api_key.as_deref(), settings.request_timeout)
            .expect("failed to build TheSportsDB connector"),
    ));
    if let Some(key) = &settings.sportradar_api_key {
        providers.push(Arc::new(
            SportradarConnector::new(key, settings.request_timeout)
                .expect("failed to build Sportradar connector"),
        ));
    }
    if let Some(key) = &settings.football_data_api_key {
        providers.push(Arc::new(
            FootballDataConnector::new(key, settings.request_timeout)
                .expect("failed to build football-data connector"),
        ));
    }

    let scorer = HealthScorer::new(bus.clone(), settings.health_window);
    ProviderRegistry::new(
        providers,
        scorer,
        bus,
        RegistryConfig {
            cascade: settings.provider_order.clone(),
            health_threshold: settings.health_threshold,
            flap_ttl: settings.flap_ttl,
            health_window: settings.health_window,
            rpm_limits: settings.rpm_limits.clone(),
        },
    )
}

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let settings = IngestSettings::from_env();

    info!("connecting to database...");
    let pool = lv_store::create_pool_with_retry(&settings.database_url, 10, Duration::from_secs(2))
        .await
        .expect("failed to connect to Postgres");
    lv_store::run_migrations(&pool)
        .await
        .expect("failed to run database migrations");

    let bus = Bus::connect_with_retry(&settings.redis_url, 10, Duration::from_secs(2))
        .await
        .expect("failed to connect to Redis");

    let registry = Arc::new(build_registry(&settings, bus.clone()));
    let normalizer = Normalizer::new(pool, bus.clone());
    let ingest = IngestService::new(bus, registry, normalizer, settings.max_concurrent_polls);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    info!("ingest service started");
    ingest.listen(shutdown_rx).await;
    info!("ingest service stopped");
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
