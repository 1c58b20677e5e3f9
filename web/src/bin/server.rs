//! Showtime HTTP server.
//!
//! Connects to Postgres, runs migrations, seeds the house screens, starts the
//! abandonment sweeper and the Prometheus exporter, then serves the API until
//! Ctrl+C or SIGTERM.

use anyhow::Context;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use showtime_core::environment::SystemClock;
use showtime_engine::metrics::register_engine_metrics;
use showtime_engine::{EngineEnvironment, ShowtimeEngine, SimulatedPaymentGateway};
use showtime_postgres::{
    PostgresBookingStore, PostgresCatalog, PostgresScreeningStore, seed_house_screens,
};
use showtime_web::{build_router, register_http_metrics, AppState, Config};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Ignoring unreadable .env file: {e}");
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,showtime=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Showtime HTTP Server");

    let config = Config::from_env();
    info!(
        host = %config.server.host,
        port = config.server.port,
        metrics_port = config.server.metrics_port,
        abandonment_window = ?config.engine.abandonment_window,
        "Configuration loaded"
    );

    // Metrics
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.server.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .set_buckets_for_metric(
            Matcher::Suffix("seconds".to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )
        .context("Invalid histogram buckets")?
        .install()
        .context("Failed to install Prometheus exporter")?;
    register_engine_metrics();
    register_http_metrics();
    info!(addr = %metrics_addr, "Metrics available at http://{}/metrics", metrics_addr);

    // Database
    info!("Connecting to database...");
    let pool = showtime_postgres::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.connect_timeout,
    )
    .await
    .context("Failed to connect to database")?;
    showtime_postgres::migrate(&pool)
        .await
        .context("Failed to run migrations")?;

    let catalog = PostgresCatalog::new(pool.clone());
    let screens = seed_house_screens(&catalog)
        .await
        .context("Failed to seed house screens")?;
    info!(screens = screens.len(), "Catalog ready");

    // Engine
    warn!("Using the simulated payment gateway; every payment succeeds");
    let env = EngineEnvironment::new(
        Arc::new(SystemClock),
        Arc::new(PostgresBookingStore::new(pool.clone())),
        Arc::new(PostgresScreeningStore::new(pool.clone())),
        Arc::new(catalog),
        SimulatedPaymentGateway::always_succeeding().shared(),
    );
    let engine = ShowtimeEngine::new(env, config.engine.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = engine
        .sweeper()
        .spawn(config.engine.sweep_interval, shutdown_rx);

    // HTTP
    let app = build_router(AppState::new(engine, pool));
    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("HTTP server stopped, stopping sweeper...");
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        error!(error = %e, "Sweeper task failed");
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
