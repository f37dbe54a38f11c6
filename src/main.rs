mod config;
mod core;
mod engine;
mod error;
mod jobs;
mod platform;
mod server;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::GraderConfig;
use crate::core::languages;
use crate::engine::sandbox::Judge0Client;
use crate::platform::{AuthContext, PlatformClient};
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("grader=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let count = languages::init_languages()?;
    info!(
        "Loaded {} language configurations: {}",
        count,
        languages::get_supported_languages().join(", ")
    );

    let config = GraderConfig::from_env().context("Failed to load grader configuration")?;

    info!("Starting Grader...");

    let sandbox = Judge0Client::new(config.judge0.clone()).context("Failed to build Judge0 client")?;
    info!(
        "Judge0 endpoint: {} (rapidapi={}, auth_token={})",
        config.judge0.base_url,
        config.judge0.api_key.is_some(),
        config.judge0.auth_token.is_some()
    );

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build platform HTTP client")?;
    info!("Platform API: {}", config.platform_url);

    info!(
        "Poller: interval={}ms, max_wait={}ms, retry_attempts={}, fail_fast={}",
        config.poller.poll_interval.as_millis(),
        config.poller.max_wait.as_millis(),
        config.poller.retry.max_attempts,
        config.poller.fail_fast
    );

    let shutdown = CancellationToken::new();
    let state = AppState {
        sandbox: Arc::new(sandbox),
        platform: PlatformClient::new(http, config.platform_url.clone(), AuthContext::anonymous()),
        poller: config.poller.clone(),
        shutdown: shutdown.clone(),
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    info!("Grader stopped");
    Ok(())
}

/// Resolve on Ctrl-C, cancelling in-flight evaluations
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, cancelling in-flight evaluations");
    shutdown.cancel();
}
