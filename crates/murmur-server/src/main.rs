//! murmurd — the murmur media job server.

mod error;
mod routes;
mod state;

use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The core library logs through the `log` facade; bridge it into
    // tracing before installing the subscriber.
    tracing_log::LogTracer::init().context("Failed to install log bridge")?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting murmurd v{}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "murmur.yaml".to_string());
    let config = murmur::config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    let state = AppState::new(config).context("Failed to open the job ledger")?;
    let app = routes::router(state.clone());

    let addr: SocketAddr = state
        .config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", state.config.server.bind))?;

    tracing::info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
