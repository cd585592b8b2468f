use anti_replay_sidecar::{router, CliArgs, Config, GateState};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli_args = CliArgs::parse();

    // Load config with precedence: CLI > env > file > defaults
    let config = Config::load(&cli_args)?;

    // Initialize tracing with configured log level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    for warning in &config.warnings {
        tracing::warn!("{}", warning);
    }

    tracing::info!("Anti-replay sidecar starting...");
    tracing::info!(timespan_secs = config.timespan_secs, "Replay window configured");
    tracing::info!("Upstream URL: {}", config.upstream_url);

    let state = Arc::new(GateState::from_config(&config));
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!("Anti-replay sidecar listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // No sweep may outlive the server
    state.validator.shutdown().await;
    tracing::info!("Anti-replay sidecar stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        // Without a signal handler, keep serving until the process is killed.
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
