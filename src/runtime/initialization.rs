//! # Initialization
//!
//! rustls setup, tracing, metrics registration and HTTP server startup.

use crate::config::Environment;
use crate::constants;
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use anyhow::{anyhow, Context, Result};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Install ring as the process-wide rustls crypto provider
///
/// Must run before the first TLS connection is made. Installing twice is
/// not an error.
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider was already installed");
    }
}

/// Map a `LOG_LEVEL` value (`DEBUG`, `INFO`, `WARNING`, `ERROR`, `CRITICAL`) to a filter directive
pub fn level_directive(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARNING" | "WARN" => Some("warn"),
        "ERROR" | "CRITICAL" => Some("error"),
        _ => None,
    }
}

/// Filter directives: `RUST_LOG` wins, then `LOG_LEVEL`, then the default
pub fn log_filter(env: &Environment) -> String {
    if let Some(filter) = env.get("RUST_LOG").filter(|f| !f.trim().is_empty()) {
        return filter.to_string();
    }
    env.get("LOG_LEVEL")
        .and_then(level_directive)
        .unwrap_or(constants::DEFAULT_LOG_FILTER)
        .to_string()
}

/// Install the global fmt subscriber
pub fn init_tracing(env: &Environment) -> Result<()> {
    let directives = log_filter(env);
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("Invalid log filter '{directives}'"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize tracing: {e}"))?;

    if let Some(level) = env.get("LOG_LEVEL") {
        if level_directive(level).is_none() && env.get("RUST_LOG").is_none() {
            tracing::warn!("Unknown LOG_LEVEL '{}', using {}", level, constants::DEFAULT_LOG_FILTER);
        }
    }
    Ok(())
}

/// Register metrics and serve probes and metrics on `port`
///
/// Returns once the listener is bound.
pub async fn start_metrics_server(port: u16) -> Result<Arc<ServerState>> {
    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = Arc::clone(&server_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(port, server_state_clone).await {
            error!("HTTP server error: {:#}", e);
        }
    });

    wait_for_server_ready(&server_state, &server_handle).await?;
    Ok(server_state)
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(constants::DEFAULT_SERVER_STARTUP_TIMEOUT_SECS);
    let poll_interval = Duration::from_millis(constants::DEFAULT_SERVER_POLL_INTERVAL_MS);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}
