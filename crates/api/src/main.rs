use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use apilytics_core::geo::NoLocation;
use apilytics_core::rate_limit::InMemoryStore;
use apilytics_db::DbConfig;
use apilytics_pipeline::{Pipeline, PipelineConfig};

use apilytics_api::config::ServerConfig;
use apilytics_api::logging;
use apilytics_api::router::build_app_router;
use apilytics_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    let db_config = DbConfig::from_env().context("Invalid database configuration")?;
    let pipeline_config = PipelineConfig::from_env().context("Invalid pipeline configuration")?;

    // --- Tracing ---
    let _log_guard = logging::init_tracing(config.log_file.as_deref())?;
    logging::install_panic_hook();
    tracing::info!(
        host = %config.host,
        port = config.port,
        rate_limit = config.rate_limit.limit,
        rate_window_ms = config.rate_limit.window.as_millis() as u64,
        "Loaded server configuration",
    );

    // --- Database ---
    let pool = apilytics_db::create_pool(&db_config)
        .await
        .context("Failed to connect to database")?;
    tracing::info!(max_connections = db_config.max_connections, "Database connection pool created");

    apilytics_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    apilytics_db::ensure_schema(&pool)
        .await
        .context("Failed to initialize database schema")?;
    tracing::info!("Database schema ensured");

    // --- Ingestion pipeline ---
    let pipeline = Arc::new(Pipeline::start(pool.clone(), &pipeline_config));

    // --- App state ---
    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        pipeline: Arc::clone(&pipeline),
        rate_limiter: Arc::new(InMemoryStore::new(config.rate_limit)),
        geo: Arc::new(NoLocation),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().context("Invalid HOST address")?,
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, draining pipeline");

    let drained = pipeline
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    pool.close().await;

    tracing::info!(drained, "Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
