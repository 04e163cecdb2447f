use std::env;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lv_bus::Bus;

use gateway::state::{AppState, SubscriptionRegistry};
use gateway::{fanout, session};

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let redis_url = env::var("REDIS_URL").expect("REDIS_URL must be set");
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8001".to_owned());

    let bus = Bus::connect_with_retry(&redis_url, 10, Duration::from_secs(2))
        .await
        .expect("failed to connect to Redis");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let state = AppState {
        bus,
        registry: SubscriptionRegistry::default(),
        shutdown: shutdown_rx.clone(),
    };

    let bridge_state = state.clone();
    let bridge_shutdown = shutdown_rx.clone();
    let bridge = tokio::spawn(async move { fanout::run_bridge(bridge_state, bridge_shutdown).await });

    let router = Router::new()
        .route("/ws", get(session::ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind");
    info!(addr = %bind_addr, "gateway listening");

    let mut serve_shutdown = shutdown_rx.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = serve_shutdown.changed().await;
        })
        .await
        .expect("server error");

    let _ = bridge.await;
    info!("gateway shut down gracefully");
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
