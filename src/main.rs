//! CodeIQ binary entry point

use std::net::SocketAddr;

use codeiq::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Initialize tracing/logging
/// 2. Load configuration from file and environment
/// 3. Initialize AppState
/// 4. Build Axum router
/// 5. Start background tasks (session sweeper, metrics listener)
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize tracing/logging
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "codeiq=info,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "codeiq=info,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting CodeIQ...");

    // 2. Initialize metrics
    codeiq::metrics::init_metrics();

    // 3. Load configuration
    let config = config::AppConfig::load()?;
    tracing::info!(
        node_env = %config.node_env,
        frontend_url = %config.frontend_url,
        "Configuration loaded"
    );

    // 4. Initialize application state
    let state = AppState::new(config.clone()).await?;

    // 5. Build Axum router
    let app = codeiq::build_router(state.clone());

    // 6. Start background tasks
    if config.session_sweep_interval_seconds > 0 {
        spawn_session_sweeper(state.clone());
    }
    if config.metrics_port > 0 {
        let metrics_addr = format!("{}:{}", config.metrics_host, config.metrics_port);
        let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr).await?;
        spawn_metrics_server(metrics_listener);
        tracing::info!("Metrics listening on {}", metrics_addr);
    }

    // 7. Start HTTP server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Spawn background task deleting expired sessions
fn spawn_session_sweeper(state: AppState) {
    tokio::spawn(async move {
        let interval_secs = state.config.session_sweep_interval_seconds;
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));

        loop {
            interval.tick().await;

            match state.sweep_expired_sessions().await {
                Ok(0) => tracing::debug!("No expired sessions"),
                Ok(removed) => tracing::info!(removed, "Expired sessions swept"),
                Err(error) => tracing::error!(%error, "Session sweep failed"),
            }
        }
    });

    tracing::info!("Session sweeper spawned");
}

/// Serve `/metrics` on its own listener, apart from the public API
fn spawn_metrics_server(listener: tokio::net::TcpListener) {
    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, codeiq::build_metrics_router()).await {
            tracing::error!(%error, "Metrics server stopped");
        }
    });
}
