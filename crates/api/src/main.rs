use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use labx_api::app::{self, AppState, Backends};
use labx_api::config::{Config, StorageBackend};
use labx_api::jobs::{JobScheduler, PoolMetricsJob, WatcherMetricsJob};
use labx_api::middleware;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics()?;

    info!("Starting LabX API v{}", env!("CARGO_PKG_VERSION"));

    let calendar = app::calendar_gateway(&config.calendar)?;
    let identity = app::identity_provider(&config.identity)?;
    let mut scheduler = JobScheduler::new();

    let backends = match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage, data is lost on restart");
            Backends::in_memory(calendar, identity)
        }
        StorageBackend::Postgres => {
            let pool = persistence::db::create_pool(&config.database.pool_config()).await?;

            info!("Running database migrations...");
            persistence::db::run_migrations(&pool).await?;
            info!("Migrations completed");

            scheduler.register(PoolMetricsJob::new(pool.clone()));
            Backends::postgres(pool, calendar, identity)
        }
    };

    let addr = config.socket_addr()?;
    let state = AppState::new(config, backends)?;
    scheduler.register(WatcherMetricsJob::new(state.consultations.clone()));
    scheduler.start();

    let app = app::create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(5)).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
