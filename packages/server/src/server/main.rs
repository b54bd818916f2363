// Main entry point for the jobs API server

use std::sync::Arc;

use anyhow::{Context, Result};
use jobs_core::domains::jobs::store::PostgresJobStore;
use jobs_core::kernel::{EventPublisher, EventRoutes, NatsEventBus, RelayConfig, ServerDeps};
use jobs_core::{server::build_app, Config};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,jobs_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting scan jobs API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Connect to NATS
    tracing::info!(url = %config.nats_url, "Connecting to NATS...");
    let nats = async_nats::connect(&config.nats_url)
        .await
        .context("Failed to connect to NATS")?;
    tracing::info!("NATS connected");

    // Outbound event queue and its relay task
    let relay_config = RelayConfig {
        max_attempts: config.event_relay_max_attempts,
        ..RelayConfig::default()
    };
    let (events, relay) = EventPublisher::channel(
        EventRoutes::json(&config.job_events_subject, &config.scan_events_subject),
        Arc::new(NatsEventBus::new(nats.clone())),
        relay_config,
    );
    let relay_handle = tokio::spawn(relay.run());

    // Build application
    let deps = ServerDeps::new(Arc::new(PostgresJobStore::new(pool.clone())), events);
    let app = build_app(deps, Some(pool));

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router held the last publisher; the relay drains what is left and exits
    tracing::info!("Draining outbound events...");
    relay_handle.await.context("Event relay panicked")?;
    nats.flush().await.context("Failed to flush NATS")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
