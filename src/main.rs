// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    routing::{get, put},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use router_telemetry::infrastructure::config::load_dashboard_config;
use router_telemetry::presentation::app_state::AppState;
use router_telemetry::presentation::handlers::{
    chart_samples, chart_svg, clear_samples, health_check, list_charts, resize_chart, stream_chart,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let dashboard = load_dashboard_config().context("loading config/dashboard")?;

    // Mount charts (application + infrastructure layers) and start polling
    let state = Arc::new(AppState::from_config(&dashboard)?);
    state.start_all().await?;

    // Build router (presentation layer)
    // Frames are compressed by the handlers themselves, so no CompressionLayer
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/charts", get(list_charts))
        .route("/charts/:id", get(chart_svg))
        .route("/charts/:id/samples", get(chart_samples).delete(clear_samples))
        .route("/charts/:id/stream", get(stream_chart))
        .route("/charts/:id/viewport", put(resize_chart))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    // Start server
    let addr: SocketAddr = dashboard
        .server
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {}", dashboard.server.listen))?;
    tracing::info!("Starting router-telemetry service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.stop_all().await;
    tracing::info!("All charts stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
