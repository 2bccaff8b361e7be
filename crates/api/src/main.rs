//! Hearth - calendar ingestion service
//!
//! Main entry point: loads configuration and secrets, starts the feed sweep
//! scheduler, and serves the HTTP API until interrupted.
//!
//! `hearth generate-key` prints a fresh feed encryption key and exits.

use std::sync::Arc;

use anyhow::Context;
use hearth_api::utils::logging::init_tracing;
use hearth_api::{router, AppContext};
use hearth_infra::{config, KeyManager};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().nth(1).as_deref() == Some("generate-key") {
        print_generated_key();
        return Ok(());
    }

    let dotenv = dotenvy::dotenv();

    let config = config::load().context("failed to load configuration")?;
    init_tracing(&config.logging).context("failed to initialise logging")?;
    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(err) => warn!(error = %err, "no .env file loaded"),
    }

    let bind_address = config.server.bind_address.clone();
    let ctx = Arc::new(AppContext::new(config).await.context("failed to build application")?);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!(address = %bind_address, "hearth listening");

    axum::serve(listener, router(Arc::clone(&ctx)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    ctx.shutdown().await.context("failed to stop scheduler")?;
    info!("hearth stopped");
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_generated_key() {
    println!("{}", KeyManager::generate_key());
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
